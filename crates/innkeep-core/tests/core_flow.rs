use chrono::{NaiveDate, TimeZone, Utc};
use innkeep_core::booking::{Booking, BookingStatus};
use innkeep_core::calendar;
use innkeep_core::datastore::DataStore;
use innkeep_core::filter::Criteria;
use innkeep_core::interval::{DateInterval, ViewWindow};
use innkeep_core::room::{CleanState, Room};
use tempfile::tempdir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

#[test]
fn datastore_roundtrip_filtering_and_grid() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let now = Utc
        .with_ymd_and_hms(2023, 11, 1, 9, 0, 0)
        .single()
        .expect("valid now");

    let rooms = vec![
        Room::new("101".to_string(), "Garden".to_string(), now),
        Room::new("204".to_string(), "Sea view".to_string(), now),
    ];
    store.save_rooms(&rooms).expect("save rooms");

    let stay = DateInterval::new(d(2023, 11, 5), d(2023, 11, 8)).expect("interval");
    let booking = Booking::new_confirmed("Grace Hopper".to_string(), "204".to_string(), stay, now, 1);
    let bookings = store
        .add_booking(vec![], booking)
        .expect("add booking should succeed");
    assert_eq!(store.next_booking_id(&bookings), 2);

    let loaded = store.load_bookings().expect("load bookings");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].status, BookingStatus::Confirmed);

    // multi-field filter: text AND status AND date overlap
    let terms: Vec<String> = ["grace", "status:confirmed", "from:2023-11-08", "to:2023-11-09"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let criteria = Criteria::parse(&terms, now).expect("parse criteria");
    assert!(criteria.matches(&loaded[0]));

    // the stay projects onto the availability grid at 4/14 x 3/14
    let window = ViewWindow::new(d(2023, 11, 1), 14).expect("window");
    let grid = calendar::build_grid(&rooms, &loaded, window);
    let row = grid.rows.iter().find(|r| r.number == "204").expect("row");
    assert_eq!(row.bars.len(), 1);
    let layout = row.bars[0].layout;
    assert!((layout.offset_fraction - 4.0 / 14.0).abs() < 1e-12);
    assert!((layout.width_fraction - 3.0 / 14.0).abs() < 1e-12);
}

#[test]
fn undo_snapshot_restores_bookings_and_rooms() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let now = Utc
        .with_ymd_and_hms(2023, 11, 1, 9, 0, 0)
        .single()
        .expect("valid now");

    let room = Room::new("101".to_string(), "Garden".to_string(), now);
    store.save_rooms(std::slice::from_ref(&room)).expect("save rooms");

    let stay = DateInterval::new(d(2023, 11, 5), d(2023, 11, 8)).expect("interval");
    let booking = Booking::new_confirmed("Ada".to_string(), "101".to_string(), stay, now, 1);
    let mut bookings = store.add_booking(vec![], booking).expect("add booking");

    store.push_current_undo_snapshot().expect("snapshot");

    // check out: booking leaves, room turns dirty
    bookings[0].status = BookingStatus::CheckedOut;
    store.save_bookings(&bookings).expect("save bookings");
    let mut dirty_room = room.clone();
    dirty_room.clean = CleanState::Dirty;
    store.save_rooms(&[dirty_room]).expect("save rooms");

    let (undo_bookings, undo_rooms) = store
        .pop_undo_snapshot()
        .expect("pop snapshot")
        .expect("snapshot present");
    assert_eq!(undo_bookings[0].status, BookingStatus::Confirmed);
    assert_eq!(undo_rooms[0].clean, CleanState::Clean);
}
