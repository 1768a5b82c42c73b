use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::booking::Booking;
use crate::directory::{Owner, User};
use crate::expense::Expense;
use crate::room::Room;
use crate::session::Session;

/// One JSONL file per entity under the data directory, written
/// atomically. Undo snapshots cover the mutable pair (bookings, rooms).
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub bookings_path: PathBuf,
    pub rooms_path: PathBuf,
    pub owners_path: PathBuf,
    pub users_path: PathBuf,
    pub expenses_path: PathBuf,
    pub undo_path: PathBuf,
    pub session_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UndoEntry {
    bookings: Vec<Booking>,
    rooms: Vec<Room>,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let store = Self {
            bookings_path: data_dir.join("bookings.data"),
            rooms_path: data_dir.join("rooms.data"),
            owners_path: data_dir.join("owners.data"),
            users_path: data_dir.join("users.data"),
            expenses_path: data_dir.join("expenses.data"),
            undo_path: data_dir.join("undo.data"),
            session_path: data_dir.join("session.data"),
            data_dir,
        };

        for path in [
            &store.bookings_path,
            &store.rooms_path,
            &store.owners_path,
            &store.users_path,
            &store.expenses_path,
            &store.undo_path,
            &store.session_path,
        ] {
            if !path.exists() {
                fs::write(path, "")?;
            }
        }

        info!(data_dir = %store.data_dir.display(), "opened datastore");
        Ok(store)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_bookings(&self) -> anyhow::Result<Vec<Booking>> {
        load_jsonl(&self.bookings_path).context("failed to load bookings.data")
    }

    #[tracing::instrument(skip(self, bookings))]
    pub fn save_bookings(&self, bookings: &[Booking]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.bookings_path, bookings).context("failed to save bookings.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_rooms(&self) -> anyhow::Result<Vec<Room>> {
        load_jsonl(&self.rooms_path).context("failed to load rooms.data")
    }

    #[tracing::instrument(skip(self, rooms))]
    pub fn save_rooms(&self, rooms: &[Room]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.rooms_path, rooms).context("failed to save rooms.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_owners(&self) -> anyhow::Result<Vec<Owner>> {
        load_jsonl(&self.owners_path).context("failed to load owners.data")
    }

    #[tracing::instrument(skip(self, owners))]
    pub fn save_owners(&self, owners: &[Owner]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.owners_path, owners).context("failed to save owners.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_users(&self) -> anyhow::Result<Vec<User>> {
        load_jsonl(&self.users_path).context("failed to load users.data")
    }

    #[tracing::instrument(skip(self, users))]
    pub fn save_users(&self, users: &[User]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.users_path, users).context("failed to save users.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_expenses(&self) -> anyhow::Result<Vec<Expense>> {
        load_jsonl(&self.expenses_path).context("failed to load expenses.data")
    }

    #[tracing::instrument(skip(self, expenses))]
    pub fn save_expenses(&self, expenses: &[Expense]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.expenses_path, expenses).context("failed to save expenses.data")
    }

    pub fn next_booking_id(&self, bookings: &[Booking]) -> u64 {
        bookings.iter().filter_map(|b| b.id).max().unwrap_or(0) + 1
    }

    pub fn next_expense_id(&self, expenses: &[Expense]) -> u64 {
        expenses.iter().filter_map(|e| e.id).max().unwrap_or(0) + 1
    }

    #[tracing::instrument(skip(self, bookings, booking), fields(id = ?booking.id, uuid = %booking.uuid))]
    pub fn add_booking(
        &self,
        mut bookings: Vec<Booking>,
        booking: Booking,
    ) -> anyhow::Result<Vec<Booking>> {
        bookings.push(booking);
        bookings.sort_by_key(|b| b.id.unwrap_or(u64::MAX));
        self.save_bookings(&bookings)?;
        Ok(bookings)
    }

    pub fn find_booking(&self, bookings: &[Booking], uuid: Uuid) -> anyhow::Result<usize> {
        bookings
            .iter()
            .position(|b| b.uuid == uuid)
            .ok_or_else(|| anyhow!("booking not found: {uuid}"))
    }

    #[tracing::instrument(skip(self, bookings, rooms))]
    pub fn push_undo_snapshot(&self, bookings: &[Booking], rooms: &[Room]) -> anyhow::Result<()> {
        let mut entries: Vec<UndoEntry> = load_jsonl(&self.undo_path)?;
        entries.push(UndoEntry {
            bookings: bookings.to_vec(),
            rooms: rooms.to_vec(),
        });
        save_jsonl_atomic(&self.undo_path, &entries)
    }

    #[tracing::instrument(skip(self))]
    pub fn push_current_undo_snapshot(&self) -> anyhow::Result<()> {
        let bookings = self.load_bookings()?;
        let rooms = self.load_rooms()?;
        self.push_undo_snapshot(&bookings, &rooms)
    }

    /// Pops the most recent snapshot without applying it; the caller
    /// decides what to restore.
    #[tracing::instrument(skip(self))]
    pub fn pop_undo_snapshot(&self) -> anyhow::Result<Option<(Vec<Booking>, Vec<Room>)>> {
        let mut entries: Vec<UndoEntry> = load_jsonl(&self.undo_path)?;
        let Some(entry) = entries.pop() else {
            return Ok(None);
        };
        save_jsonl_atomic(&self.undo_path, &entries)?;
        Ok(Some((entry.bookings, entry.rooms)))
    }

    #[tracing::instrument(skip(self))]
    pub fn load_session(&self) -> anyhow::Result<Option<Session>> {
        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed reading {}", self.session_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let session: Session = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {}", self.session_path.display()))?;
        Ok(Some(session))
    }

    #[tracing::instrument(skip(self, session))]
    pub fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        let payload = serde_json::to_string(session)?;
        fs::write(&self.session_path, payload)
            .with_context(|| format!("failed writing {}", self.session_path.display()))?;
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
