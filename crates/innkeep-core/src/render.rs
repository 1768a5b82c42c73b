use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, Duration, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::booking::{Booking, BookingStatus};
use crate::calendar::AvailabilityGrid;
use crate::config::Config;
use crate::datetime::format_stamp;
use crate::directory::{Owner, User};
use crate::expense::Expense;
use crate::room::{CleanState, Room};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, bookings))]
    pub fn print_booking_table(&mut self, bookings: &[&Booking]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Ref".to_string(),
            "Guest".to_string(),
            "Room".to_string(),
            "Check-in".to_string(),
            "Check-out".to_string(),
            "Nts".to_string(),
            "Status".to_string(),
            "Total".to_string(),
        ];

        let mut rows = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let id = booking
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let id = self.paint(&id, "33");

            let status = booking.status.as_str().to_string();
            let status = match booking.status {
                BookingStatus::Cancelled => self.paint(&status, "31"),
                BookingStatus::CheckedIn => self.paint(&status, "32"),
                _ => status,
            };

            let total = booking
                .total()
                .map(|value| format!("{value:.2}"))
                .unwrap_or_default();

            rows.push(vec![
                id,
                booking.reference.clone(),
                booking.guest.clone(),
                booking.room.clone(),
                booking.check_in.to_string(),
                booking.check_out.to_string(),
                booking.nights().to_string(),
                status,
                total,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, booking))]
    pub fn print_booking_info(&mut self, booking: &Booking) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(
            out,
            "id         {}",
            booking
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "uuid       {}", booking.uuid)?;
        writeln!(out, "reference  {}", booking.reference)?;
        writeln!(out, "guest      {}", booking.guest)?;
        writeln!(out, "room       {}", booking.room)?;
        writeln!(out, "check-in   {}", booking.check_in)?;
        writeln!(out, "check-out  {}", booking.check_out)?;
        writeln!(out, "nights     {}", booking.nights())?;
        writeln!(out, "guests     {}", booking.guests)?;
        writeln!(out, "status     {}", booking.status.as_str())?;
        if let Some(rate) = booking.rate {
            writeln!(out, "rate       {rate:.2}")?;
        }
        if let Some(total) = booking.total() {
            writeln!(out, "total      {total:.2}")?;
        }
        writeln!(out, "entry      {}", format_stamp(booking.entry))?;
        writeln!(out, "modified   {}", format_stamp(booking.modified))?;
        for note in &booking.notes {
            writeln!(out, "note       {}  {}", format_stamp(note.entry), note.text)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, rooms))]
    pub fn print_room_table(&mut self, rooms: &[&Room]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "Room".to_string(),
            "Name".to_string(),
            "Owner".to_string(),
            "Cap".to_string(),
            "Rate".to_string(),
            "Clean".to_string(),
        ];

        let mut rows = Vec::with_capacity(rooms.len());
        for room in rooms {
            let clean = room.clean.as_str().to_string();
            let clean = match room.clean {
                CleanState::Dirty => self.paint(&clean, "31"),
                CleanState::Clean => clean,
                CleanState::InProgress => self.paint(&clean, "33"),
            };

            rows.push(vec![
                self.paint(&room.number, "33"),
                room.name.clone(),
                room.owner.clone(),
                room.capacity.to_string(),
                room.rate.map(|r| format!("{r:.2}")).unwrap_or_default(),
                clean,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, owners))]
    pub fn print_owner_table(&mut self, owners: &[&Owner]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "Name".to_string(),
            "Email".to_string(),
            "Phone".to_string(),
            "Property".to_string(),
        ];

        let rows = owners
            .iter()
            .map(|owner| {
                vec![
                    owner.name.clone(),
                    owner.email.clone(),
                    owner.phone.clone(),
                    owner.property.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, users))]
    pub fn print_user_table(&mut self, users: &[&User]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "Username".to_string(),
            "Name".to_string(),
            "Role".to_string(),
            "Active".to_string(),
        ];

        let rows = users
            .iter()
            .map(|user| {
                vec![
                    user.username.clone(),
                    user.name.clone(),
                    user.role.as_str().to_string(),
                    if user.active { "yes" } else { "no" }.to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, expenses))]
    pub fn print_expense_table(&mut self, expenses: &[&Expense]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Category".to_string(),
            "Room".to_string(),
            "Amount".to_string(),
            "Description".to_string(),
        ];

        let mut rows = Vec::with_capacity(expenses.len());
        for expense in expenses {
            let id = expense
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            rows.push(vec![
                self.paint(&id, "33"),
                expense.date.to_string(),
                expense.category.clone(),
                expense.room.clone().unwrap_or_default(),
                format!("{:.2}", expense.amount),
                expense.description.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;

        let total: f64 = expenses.iter().map(|e| e.amount).sum();
        writeln!(out, "Total {total:.2}")?;
        Ok(())
    }

    /// Renders the availability grid as fixed-width day columns. Each
    /// booking bar's `Layout` fractions map back to whole columns, so a
    /// 3-night stay on a 14-day window always spans exactly 3 cells.
    #[tracing::instrument(skip(self, grid))]
    pub fn print_calendar(&mut self, grid: &AvailabilityGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let days = grid.window.days() as usize;
        const CELL: usize = 3;

        let mut header = format!("{:<10}", "Room");
        for offset in 0..days {
            let date = day_at(grid.window.start(), offset);
            header.push_str(&format!("{:<width$}", date.day(), width = CELL));
        }
        writeln!(out, "{header}")?;

        for row in &grid.rows {
            let mut cells = vec![b'.'; days * CELL];
            // keep a visual gap between back-to-back bookings
            for (idx, cell) in cells.iter_mut().enumerate() {
                if idx % CELL == CELL - 1 {
                    *cell = b' ';
                }
            }
            for bar in &row.bars {
                let (first, span) = grid.window.columns(bar.layout);
                let lo = first * CELL;
                let hi = ((first + span) * CELL - 1).min(cells.len());
                for cell in &mut cells[lo..hi] {
                    *cell = match bar.status {
                        BookingStatus::CheckedIn => b'=',
                        _ => b'#',
                    };
                }
            }

            let label = if row.clean == CleanState::Dirty {
                self.paint(&row.number, "31")
            } else {
                row.number.clone()
            };
            let pad = 10usize.saturating_sub(UnicodeWidthStr::width(row.number.as_str()));
            writeln!(
                out,
                "{}{}{}",
                label,
                " ".repeat(pad),
                String::from_utf8_lossy(&cells)
            )?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn day_at(start: NaiveDate, offset: usize) -> NaiveDate {
    start + Duration::days(offset as i64)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
