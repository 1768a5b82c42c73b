use crate::booking::{Booking, BookingStatus};
use crate::interval::{Layout, ViewWindow};
use crate::room::{CleanState, Room};

/// One positioned booking bar on a room row. Carries only what the
/// renderer needs; the underlying booking is untouched.
#[derive(Debug, Clone)]
pub struct BookingBar {
    pub id: Option<u64>,
    pub reference: String,
    pub guest: String,
    pub status: BookingStatus,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct RoomRow {
    pub number: String,
    pub name: String,
    pub clean: CleanState,
    pub bars: Vec<BookingBar>,
}

#[derive(Debug, Clone)]
pub struct AvailabilityGrid {
    pub window: ViewWindow,
    pub rows: Vec<RoomRow>,
}

/// Builds the availability grid for a window: one row per room, one bar
/// per booking whose stay projects onto the window. Pure over its
/// inputs; callers recompute it per view, nothing is retained.
pub fn build_grid(rooms: &[Room], bookings: &[Booking], window: ViewWindow) -> AvailabilityGrid {
    let mut rows: Vec<RoomRow> = rooms
        .iter()
        .map(|room| {
            let mut bars: Vec<BookingBar> = bookings
                .iter()
                .filter(|b| b.room == room.number && b.occupies_room())
                .filter_map(|b| {
                    window.project(b.stay()).map(|layout| BookingBar {
                        id: b.id,
                        reference: b.reference.clone(),
                        guest: b.guest.clone(),
                        status: b.status,
                        layout,
                    })
                })
                .collect();
            bars.sort_by(|a, b| {
                a.layout
                    .offset_fraction
                    .partial_cmp(&b.layout.offset_fraction)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            RoomRow {
                number: room.number.clone(),
                name: room.name.clone(),
                clean: room.clean,
                bars,
            }
        })
        .collect();

    rows.sort_by(|a, b| a.number.cmp(&b.number));
    AvailabilityGrid { window, rows }
}

/// Bookings checking in on a day inside the window, soonest first.
pub fn arrivals<'a>(bookings: &'a [Booking], window: ViewWindow) -> Vec<&'a Booking> {
    let mut out: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.occupies_room() && window.contains(b.check_in))
        .collect();
    out.sort_by_key(|b| (b.check_in, b.id));
    out
}

/// Bookings checking out on a day inside the window, soonest first.
pub fn departures<'a>(bookings: &'a [Booking], window: ViewWindow) -> Vec<&'a Booking> {
    let mut out: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.occupies_room() && window.contains(b.check_out))
        .collect();
    out.sort_by_key(|b| (b.check_out, b.id));
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{arrivals, build_grid, departures};
    use crate::booking::{Booking, BookingStatus};
    use crate::interval::{DateInterval, ViewWindow};
    use crate::room::Room;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn booking(room: &str, ci: NaiveDate, co: NaiveDate, id: u64) -> Booking {
        let now = Utc
            .with_ymd_and_hms(2023, 11, 1, 9, 0, 0)
            .single()
            .expect("valid now");
        let stay = DateInterval::new(ci, co).expect("interval");
        Booking::new_confirmed(format!("guest-{id}"), room.to_string(), stay, now, id)
    }

    fn rooms() -> Vec<Room> {
        let now = Utc
            .with_ymd_and_hms(2023, 11, 1, 9, 0, 0)
            .single()
            .expect("valid now");
        vec![
            Room::new("204".to_string(), "Sea view".to_string(), now),
            Room::new("101".to_string(), "Garden".to_string(), now),
        ]
    }

    #[test]
    fn grid_places_bars_on_their_room_rows() {
        let window = ViewWindow::new(d(2023, 11, 1), 14).expect("window");
        let bookings = vec![
            booking("101", d(2023, 11, 5), d(2023, 11, 8), 1),
            booking("204", d(2023, 11, 2), d(2023, 11, 4), 2),
            // outside the window entirely
            booking("101", d(2023, 12, 1), d(2023, 12, 5), 3),
        ];

        let grid = build_grid(&rooms(), &bookings, window);
        assert_eq!(grid.rows.len(), 2);
        // rows come back sorted by room number
        assert_eq!(grid.rows[0].number, "101");
        assert_eq!(grid.rows[1].number, "204");

        assert_eq!(grid.rows[0].bars.len(), 1);
        assert_eq!(grid.rows[0].bars[0].reference, "BK-0001");
        assert!((grid.rows[0].bars[0].layout.offset_fraction - 4.0 / 14.0).abs() < 1e-12);
        assert_eq!(grid.rows[1].bars.len(), 1);
    }

    #[test]
    fn cancelled_bookings_do_not_occupy_the_grid() {
        let window = ViewWindow::new(d(2023, 11, 1), 14).expect("window");
        let mut cancelled = booking("101", d(2023, 11, 5), d(2023, 11, 8), 1);
        cancelled.status = BookingStatus::Cancelled;

        let grid = build_grid(&rooms(), &[cancelled.clone()], window);
        let row = grid.rows.iter().find(|r| r.number == "101").expect("row");
        assert!(row.bars.is_empty());

        assert!(arrivals(&[cancelled.clone()], window).is_empty());
        assert!(departures(&[cancelled], window).is_empty());
    }

    #[test]
    fn bars_on_a_row_are_ordered_by_offset() {
        let window = ViewWindow::new(d(2023, 11, 1), 14).expect("window");
        let bookings = vec![
            booking("101", d(2023, 11, 9), d(2023, 11, 12), 1),
            booking("101", d(2023, 11, 2), d(2023, 11, 5), 2),
        ];

        let grid = build_grid(&rooms(), &bookings, window);
        let row = grid.rows.iter().find(|r| r.number == "101").expect("row");
        assert_eq!(row.bars.len(), 2);
        assert_eq!(row.bars[0].reference, "BK-0002");
        assert_eq!(row.bars[1].reference, "BK-0001");
    }

    #[test]
    fn arrivals_and_departures_use_window_boundaries_inclusively() {
        let window = ViewWindow::new(d(2023, 11, 1), 7).expect("window");
        let bookings = vec![
            // checks in on the first window day
            booking("101", d(2023, 11, 1), d(2023, 11, 3), 1),
            // checks out on the last window day
            booking("204", d(2023, 10, 28), d(2023, 11, 7), 2),
            // checks in the day after the window closes
            booking("101", d(2023, 11, 8), d(2023, 11, 10), 3),
        ];

        let arriving: Vec<u64> = arrivals(&bookings, window).iter().filter_map(|b| b.id).collect();
        let departing: Vec<u64> = departures(&bookings, window)
            .iter()
            .filter_map(|b| b.id)
            .collect();

        assert_eq!(arriving, vec![1]);
        assert_eq!(departing, vec![1, 2]);
    }
}
