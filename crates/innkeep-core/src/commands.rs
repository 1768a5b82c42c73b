use std::collections::BTreeMap;
use std::io::{self, Read};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::booking::{Booking, BookingStatus, Note};
use crate::calendar;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{parse_day_expr, to_property_date};
use crate::directory::{Owner, Role, User};
use crate::expense::Expense;
use crate::filter::Criteria;
use crate::interval::{DateInterval, ViewWindow};
use crate::render::Renderer;
use crate::room::{CleanState, Room};
use crate::session::SessionContext;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "modify",
        "cancel",
        "checkin",
        "checkout",
        "list",
        "info",
        "note",
        "calendar",
        "arrivals",
        "departures",
        "rooms",
        "addroom",
        "clean",
        "dirty",
        "owners",
        "addowner",
        "users",
        "adduser",
        "expenses",
        "addexpense",
        "undo",
        "export",
        "import",
        "login",
        "logout",
        "whoami",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let mut session = SessionContext::init(store)?;
    let command = inv.command.as_str();
    let criteria = Criteria::parse(&inv.filter_terms, now)?;

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        user = ?session.current_user(),
        "dispatching command"
    );

    let result = match command {
        "add" => cmd_add(store, &inv.command_args, now),
        "modify" => cmd_modify(store, &criteria, &inv.command_args, now),
        "cancel" => cmd_cancel(store, &criteria, now),
        "checkin" => cmd_checkin(store, &criteria, now),
        "checkout" => cmd_checkout(store, &criteria, now),
        "list" => cmd_list(store, renderer, &criteria),
        "info" => cmd_info(store, renderer, &criteria),
        "note" => cmd_note(store, &criteria, &inv.command_args, now),
        "calendar" => cmd_calendar(store, cfg, renderer, &criteria, &inv.command_args, now),
        "arrivals" => cmd_arrivals(store, cfg, renderer, &criteria, &inv.command_args, now),
        "departures" => cmd_departures(store, cfg, renderer, &criteria, &inv.command_args, now),
        "rooms" => cmd_rooms(store, renderer, &criteria),
        "addroom" => cmd_addroom(store, &inv.command_args, now),
        "clean" => cmd_set_clean(store, &inv.command_args, CleanState::Clean, now),
        "dirty" => cmd_set_clean(store, &inv.command_args, CleanState::Dirty, now),
        "owners" => cmd_owners(store, renderer, &criteria),
        "addowner" => cmd_addowner(store, &inv.command_args),
        "users" => cmd_users(store, renderer, &criteria),
        "adduser" => cmd_adduser(store, &inv.command_args),
        "expenses" => cmd_expenses(store, renderer, &criteria),
        "addexpense" => cmd_addexpense(store, &inv.command_args, now),
        "undo" => cmd_undo(store),
        "export" => cmd_export(store, &criteria),
        "import" => cmd_import(store, now),
        "login" => cmd_login(&mut session, &inv.command_args, now),
        "logout" => {
            session.logout();
            Ok(())
        }
        "whoami" => cmd_whoami(&session),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    };

    session.teardown(store)?;
    result
}

/// Splits command arguments into `key:value` modifiers (for the given
/// keys) and leftover free words.
fn split_modifiers(args: &[String], keys: &[&str]) -> (Vec<String>, BTreeMap<String, String>) {
    let mut words = Vec::new();
    let mut modifiers = BTreeMap::new();

    for arg in args {
        if let Some((k, v)) = arg.split_once(':')
            && keys.contains(&k)
        {
            modifiers.insert(k.to_string(), v.to_string());
            continue;
        }
        words.push(arg.clone());
    }

    (words, modifiers)
}

fn select_bookings<'a>(criteria: &Criteria, bookings: &'a [Booking]) -> anyhow::Result<Vec<&'a Booking>> {
    if criteria.is_empty() {
        return Err(anyhow!("no filter given; refusing to act on all bookings"));
    }
    let selected = criteria.apply(bookings);
    if selected.is_empty() {
        return Err(anyhow!("no matching bookings"));
    }
    Ok(selected)
}

fn selected_uuids(criteria: &Criteria, bookings: &[Booking]) -> anyhow::Result<Vec<uuid::Uuid>> {
    Ok(select_bookings(criteria, bookings)?
        .into_iter()
        .map(|b| b.uuid)
        .collect())
}

#[instrument(skip(store, args, now))]
fn cmd_add(store: &mut DataStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    let (words, modifiers) =
        split_modifiers(args, &["room", "from", "to", "rate", "guests"]);

    let guest = words.join(" ");
    if guest.trim().is_empty() {
        return Err(anyhow!("add requires a guest name"));
    }
    let room = modifiers
        .get("room")
        .ok_or_else(|| anyhow!("add requires room:<number>"))?
        .clone();
    let check_in = modifiers
        .get("from")
        .ok_or_else(|| anyhow!("add requires from:<day>"))
        .and_then(|raw| parse_day_expr(raw, now))?;
    let check_out = modifiers
        .get("to")
        .ok_or_else(|| anyhow!("add requires to:<day>"))
        .and_then(|raw| parse_day_expr(raw, now))?;
    let stay = DateInterval::new(check_in, check_out)
        .context("check-out must not precede check-in")?;

    let rooms = store.load_rooms()?;
    if !rooms.iter().any(|r| r.number == room) {
        warn!(room = %room, "booking references a room not on file");
    }

    let bookings = store.load_bookings()?;
    for other in bookings.iter().filter(|b| b.room == room && b.occupies_room()) {
        if other.stay().overlaps(stay) {
            warn!(
                reference = %other.reference,
                other_stay = %other.stay(),
                "room already booked for an overlapping stay"
            );
        }
    }

    let id = store.next_booking_id(&bookings);
    let mut booking = Booking::new_confirmed(guest, room, stay, now, id);
    if let Some(raw) = modifiers.get("rate") {
        booking.rate = Some(raw.parse::<f64>().context("invalid rate")?);
    }
    if let Some(raw) = modifiers.get("guests") {
        booking.guests = raw.parse::<u32>().context("invalid guest count")?;
    }

    // snapshot only once the booking has fully validated; a failed add
    // must not leave a no-op entry on the undo stack
    store.push_undo_snapshot(&bookings, &rooms)?;

    let reference = booking.reference.clone();
    store.add_booking(bookings, booking)?;
    println!("Created booking {id} ({reference})");
    Ok(())
}

#[instrument(skip(store, criteria, args, now))]
fn cmd_modify(
    store: &mut DataStore,
    criteria: &Criteria,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let (words, modifiers) =
        split_modifiers(args, &["room", "from", "to", "rate", "guests", "status"]);

    let room = modifiers.get("room").cloned();
    let check_in = match modifiers.get("from") {
        Some(raw) => Some(parse_day_expr(raw, now)?),
        None => None,
    };
    let check_out = match modifiers.get("to") {
        Some(raw) => Some(parse_day_expr(raw, now)?),
        None => None,
    };
    let rate = match modifiers.get("rate") {
        Some(raw) => Some(raw.parse::<f64>().context("invalid rate")?),
        None => None,
    };
    let guests = match modifiers.get("guests") {
        Some(raw) => Some(raw.parse::<u32>().context("invalid guest count")?),
        None => None,
    };
    let status = match modifiers.get("status") {
        Some(raw) => {
            Some(BookingStatus::parse(raw).ok_or_else(|| anyhow!("invalid status: {raw}"))?)
        }
        None => None,
    };

    let bookings = store.load_bookings()?;
    let uuids = selected_uuids(criteria, &bookings)?;

    // mutate a working copy; nothing is snapshotted or saved until every
    // change has validated, so a failed modify cannot eat an undo entry
    let mut updated = bookings.clone();
    let mut changed = 0usize;
    for booking in updated.iter_mut().filter(|b| uuids.contains(&b.uuid)) {
        if !words.is_empty() {
            booking.guest = words.join(" ");
        }
        if let Some(room) = &room {
            booking.room = room.clone();
        }
        if let Some(day) = check_in {
            booking.check_in = day;
        }
        if let Some(day) = check_out {
            booking.check_out = day;
        }
        // re-validate the stay after any date change
        DateInterval::new(booking.check_in, booking.check_out)
            .context("check-out must not precede check-in")?;
        if let Some(rate) = rate {
            booking.rate = Some(rate);
        }
        if let Some(guests) = guests {
            booking.guests = guests;
        }
        if let Some(status) = status {
            booking.status = status;
        }
        booking.modified = now;
        changed += 1;
    }

    let rooms = store.load_rooms()?;
    store.push_undo_snapshot(&bookings, &rooms)?;
    store.save_bookings(&updated)?;
    println!("Modified {changed} booking(s)");
    Ok(())
}

#[instrument(skip(store, criteria, now))]
fn cmd_cancel(store: &mut DataStore, criteria: &Criteria, now: DateTime<Utc>) -> anyhow::Result<()> {
    let mut bookings = store.load_bookings()?;
    let uuids = selected_uuids(criteria, &bookings)?;
    store.push_current_undo_snapshot()?;

    let mut cancelled = 0usize;
    for booking in bookings.iter_mut().filter(|b| uuids.contains(&b.uuid)) {
        if booking.status == BookingStatus::Cancelled {
            warn!(reference = %booking.reference, "booking already cancelled");
            continue;
        }
        booking.status = BookingStatus::Cancelled;
        booking.modified = now;
        info!(reference = %booking.reference, "cancelled booking");
        cancelled += 1;
    }

    store.save_bookings(&bookings)?;
    println!("Cancelled {cancelled} booking(s)");
    Ok(())
}

#[instrument(skip(store, criteria, now))]
fn cmd_checkin(store: &mut DataStore, criteria: &Criteria, now: DateTime<Utc>) -> anyhow::Result<()> {
    let mut bookings = store.load_bookings()?;
    let uuids = selected_uuids(criteria, &bookings)?;
    store.push_current_undo_snapshot()?;

    let mut arrived = 0usize;
    for booking in bookings.iter_mut().filter(|b| uuids.contains(&b.uuid)) {
        if booking.status != BookingStatus::Confirmed {
            warn!(
                reference = %booking.reference,
                status = booking.status.as_str(),
                "only confirmed bookings can check in; skipping"
            );
            continue;
        }
        booking.status = BookingStatus::CheckedIn;
        booking.modified = now;
        println!("Checked in {} ({})", booking.guest, booking.reference);
        arrived += 1;
    }

    store.save_bookings(&bookings)?;
    if arrived == 0 {
        println!("Nothing to check in");
    }
    Ok(())
}

#[instrument(skip(store, criteria, now))]
fn cmd_checkout(store: &mut DataStore, criteria: &Criteria, now: DateTime<Utc>) -> anyhow::Result<()> {
    let mut bookings = store.load_bookings()?;
    let mut rooms = store.load_rooms()?;
    let uuids = selected_uuids(criteria, &bookings)?;
    store.push_undo_snapshot(&bookings, &rooms)?;

    let mut departed = 0usize;
    for booking in bookings.iter_mut().filter(|b| uuids.contains(&b.uuid)) {
        if !matches!(
            booking.status,
            BookingStatus::CheckedIn | BookingStatus::Confirmed
        ) {
            warn!(
                reference = %booking.reference,
                status = booking.status.as_str(),
                "booking not checked in; skipping"
            );
            continue;
        }
        booking.status = BookingStatus::CheckedOut;
        booking.modified = now;

        // the vacated room needs housekeeping
        if let Some(room) = rooms.iter_mut().find(|r| r.number == booking.room) {
            room.clean = CleanState::Dirty;
            room.modified = now;
        }
        println!("Checked out {} ({})", booking.guest, booking.reference);
        departed += 1;
    }

    store.save_bookings(&bookings)?;
    store.save_rooms(&rooms)?;
    if departed == 0 {
        println!("Nothing to check out");
    }
    Ok(())
}

#[instrument(skip(store, renderer, criteria))]
fn cmd_list(
    store: &mut DataStore,
    renderer: &mut Renderer,
    criteria: &Criteria,
) -> anyhow::Result<()> {
    let bookings = store.load_bookings()?;
    let mut selected = criteria.apply(&bookings);

    // cancelled bookings stay out of the default listing unless the
    // caller asked for them by id or status
    if !criteria.has_explicit_selector() {
        selected.retain(|b| b.status != BookingStatus::Cancelled);
    }

    renderer.print_booking_table(&selected)?;
    println!("{} booking(s)", selected.len());
    Ok(())
}

#[instrument(skip(store, renderer, criteria))]
fn cmd_info(
    store: &mut DataStore,
    renderer: &mut Renderer,
    criteria: &Criteria,
) -> anyhow::Result<()> {
    let bookings = store.load_bookings()?;
    let selected = select_bookings(criteria, &bookings)?;
    for booking in selected {
        renderer.print_booking_info(booking)?;
        println!();
    }
    Ok(())
}

#[instrument(skip(store, criteria, args, now))]
fn cmd_note(
    store: &mut DataStore,
    criteria: &Criteria,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let text = args.join(" ");
    if text.trim().is_empty() {
        return Err(anyhow!("note requires text"));
    }

    let mut bookings = store.load_bookings()?;
    let uuids = selected_uuids(criteria, &bookings)?;
    store.push_current_undo_snapshot()?;

    let mut noted = 0usize;
    for booking in bookings.iter_mut().filter(|b| uuids.contains(&b.uuid)) {
        booking.notes.push(Note {
            entry: now,
            text: text.clone(),
        });
        booking.modified = now;
        noted += 1;
    }

    store.save_bookings(&bookings)?;
    println!("Noted {noted} booking(s)");
    Ok(())
}

fn resolve_window(
    cfg: &Config,
    criteria: &Criteria,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<ViewWindow> {
    let start = criteria
        .range
        .map(|range| range.start())
        .unwrap_or_else(|| to_property_date(now));

    let (_, modifiers) = split_modifiers(args, &["days"]);
    let days = match modifiers.get("days") {
        Some(raw) => raw.parse::<u32>().context("invalid days:<n> value")?,
        None => cfg.get_u32("calendar.days")?.unwrap_or(14),
    };

    ViewWindow::new(start, days)
}

#[instrument(skip(store, cfg, renderer, criteria, args, now))]
fn cmd_calendar(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    criteria: &Criteria,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let window = resolve_window(cfg, criteria, args, now)?;
    let rooms = store.load_rooms()?;
    let bookings = store.load_bookings()?;

    let grid = calendar::build_grid(&rooms, &bookings, window);
    renderer.print_calendar(&grid)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, criteria, args, now))]
fn cmd_arrivals(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    criteria: &Criteria,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let window = resolve_window(cfg, criteria, args, now)?;
    let bookings = store.load_bookings()?;
    let arriving = calendar::arrivals(&bookings, window);
    renderer.print_booking_table(&arriving)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, criteria, args, now))]
fn cmd_departures(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    criteria: &Criteria,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let window = resolve_window(cfg, criteria, args, now)?;
    let bookings = store.load_bookings()?;
    let departing = calendar::departures(&bookings, window);
    renderer.print_booking_table(&departing)?;
    Ok(())
}

#[instrument(skip(store, renderer, criteria))]
fn cmd_rooms(
    store: &mut DataStore,
    renderer: &mut Renderer,
    criteria: &Criteria,
) -> anyhow::Result<()> {
    let mut rooms = store.load_rooms()?;
    rooms.sort_by(|a, b| a.number.cmp(&b.number));
    let selected = criteria.apply(&rooms);
    renderer.print_room_table(&selected)?;
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_addroom(store: &mut DataStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    let (words, modifiers) = split_modifiers(args, &["owner", "cap", "rate"]);
    let mut words = words.into_iter();
    let number = words
        .next()
        .ok_or_else(|| anyhow!("addroom requires a room number"))?;
    let name = words.collect::<Vec<_>>().join(" ");

    let mut rooms = store.load_rooms()?;
    if rooms.iter().any(|r| r.number == number) {
        return Err(anyhow!("room {number} already exists"));
    }

    let mut room = Room::new(number.clone(), name, now);
    if let Some(owner) = modifiers.get("owner") {
        room.owner = owner.clone();
    }
    if let Some(raw) = modifiers.get("cap") {
        room.capacity = raw.parse::<u32>().context("invalid capacity")?;
    }
    if let Some(raw) = modifiers.get("rate") {
        room.rate = Some(raw.parse::<f64>().context("invalid rate")?);
    }

    rooms.push(room);
    rooms.sort_by(|a, b| a.number.cmp(&b.number));
    store.save_rooms(&rooms)?;
    println!("Created room {number}");
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_set_clean(
    store: &mut DataStore,
    args: &[String],
    state: CleanState,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if args.is_empty() {
        return Err(anyhow!("expected one or more room numbers"));
    }

    let mut rooms = store.load_rooms()?;
    store.push_current_undo_snapshot()?;

    let mut changed = 0usize;
    for number in args {
        let Some(room) = rooms.iter_mut().find(|r| &r.number == number) else {
            warn!(room = %number, "no such room");
            continue;
        };
        room.clean = state;
        room.modified = now;
        changed += 1;
    }

    store.save_rooms(&rooms)?;
    println!("Marked {changed} room(s) {}", state.as_str());
    Ok(())
}

#[instrument(skip(store, renderer, criteria))]
fn cmd_owners(
    store: &mut DataStore,
    renderer: &mut Renderer,
    criteria: &Criteria,
) -> anyhow::Result<()> {
    let mut owners = store.load_owners()?;
    owners.sort_by(|a, b| a.name.cmp(&b.name));
    let selected = criteria.apply(&owners);
    renderer.print_owner_table(&selected)?;
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_addowner(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    let (words, modifiers) = split_modifiers(args, &["email", "phone", "property"]);
    let name = words.join(" ");
    if name.trim().is_empty() {
        return Err(anyhow!("addowner requires a name"));
    }

    let mut owner = Owner::new(name.clone());
    if let Some(email) = modifiers.get("email") {
        owner.email = email.clone();
    }
    if let Some(phone) = modifiers.get("phone") {
        owner.phone = phone.clone();
    }
    if let Some(property) = modifiers.get("property") {
        owner.property = property.clone();
    }

    let mut owners = store.load_owners()?;
    owners.push(owner);
    store.save_owners(&owners)?;
    println!("Created owner {name}");
    Ok(())
}

#[instrument(skip(store, renderer, criteria))]
fn cmd_users(
    store: &mut DataStore,
    renderer: &mut Renderer,
    criteria: &Criteria,
) -> anyhow::Result<()> {
    let mut users = store.load_users()?;
    users.sort_by(|a, b| a.username.cmp(&b.username));
    let selected = criteria.apply(&users);
    renderer.print_user_table(&selected)?;
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_adduser(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    let (words, modifiers) = split_modifiers(args, &["role"]);
    let mut words = words.into_iter();
    let username = words
        .next()
        .ok_or_else(|| anyhow!("adduser requires a username"))?;
    let name = words.collect::<Vec<_>>().join(" ");

    let role = match modifiers.get("role") {
        Some(raw) => Role::parse(raw).ok_or_else(|| anyhow!("invalid role: {raw}"))?,
        None => Role::Staff,
    };

    let mut users = store.load_users()?;
    if users.iter().any(|u| u.username == username) {
        return Err(anyhow!("user {username} already exists"));
    }

    let mut user = User::new(username.clone(), role);
    user.name = name;
    users.push(user);
    store.save_users(&users)?;
    println!("Created user {username}");
    Ok(())
}

#[instrument(skip(store, renderer, criteria))]
fn cmd_expenses(
    store: &mut DataStore,
    renderer: &mut Renderer,
    criteria: &Criteria,
) -> anyhow::Result<()> {
    let mut expenses = store.load_expenses()?;
    expenses.sort_by_key(|e| (e.date, e.id));
    let selected = criteria.apply(&expenses);
    renderer.print_expense_table(&selected)?;
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_addexpense(store: &mut DataStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    let (words, modifiers) = split_modifiers(args, &["category", "date", "room"]);
    let mut words = words.into_iter();
    let amount: f64 = words
        .next()
        .ok_or_else(|| anyhow!("addexpense requires an amount"))?
        .parse()
        .context("invalid amount")?;
    let description = words.collect::<Vec<_>>().join(" ");
    if description.trim().is_empty() {
        return Err(anyhow!("addexpense requires a description"));
    }

    let date = match modifiers.get("date") {
        Some(raw) => parse_day_expr(raw, now)?,
        None => to_property_date(now),
    };

    let mut expenses = store.load_expenses()?;
    let id = store.next_expense_id(&expenses);
    let mut expense = Expense::new(description, amount, date, id);
    if let Some(category) = modifiers.get("category") {
        expense.category = category.to_ascii_lowercase();
    }
    if let Some(room) = modifiers.get("room") {
        expense.room = Some(room.clone());
    }

    expenses.push(expense);
    expenses.sort_by_key(|e| e.id);
    store.save_expenses(&expenses)?;
    println!("Created expense {id}");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_undo(store: &mut DataStore) -> anyhow::Result<()> {
    match store.pop_undo_snapshot()? {
        Some((bookings, rooms)) => {
            store.save_bookings(&bookings)?;
            store.save_rooms(&rooms)?;
            println!("Restored previous state");
            Ok(())
        }
        None => {
            println!("Nothing to undo");
            Ok(())
        }
    }
}

#[instrument(skip(store, criteria))]
fn cmd_export(store: &mut DataStore, criteria: &Criteria) -> anyhow::Result<()> {
    let bookings = store.load_bookings()?;
    let selected: Vec<&Booking> = criteria.apply(&bookings);
    let payload = serde_json::to_string_pretty(&selected)?;
    println!("{payload}");
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_import(store: &mut DataStore, now: DateTime<Utc>) -> anyhow::Result<()> {
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("failed reading stdin")?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import expects JSON on stdin"));
    }

    let incoming = parse_import_items(trimmed)?;
    let mut bookings = store.load_bookings()?;
    let rooms = store.load_rooms()?;
    store.push_undo_snapshot(&bookings, &rooms)?;

    let mut imported = 0usize;
    for mut item in incoming {
        item.modified = now;
        match bookings.iter().position(|b| b.uuid == item.uuid) {
            Some(idx) => {
                item.id = bookings[idx].id;
                bookings[idx] = item;
            }
            None => {
                if item.id.is_none() {
                    item.id = Some(store.next_booking_id(&bookings));
                }
                bookings.push(item);
            }
        }
        imported += 1;
    }

    bookings.sort_by_key(|b| b.id.unwrap_or(u64::MAX));
    store.save_bookings(&bookings)?;
    println!("Imported {imported} booking(s)");
    Ok(())
}

fn parse_import_items(trimmed: &str) -> anyhow::Result<Vec<Booking>> {
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("failed parsing JSON array");
    }

    let mut out = Vec::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let booking: Booking = serde_json::from_str(line)
            .with_context(|| format!("failed parsing line {}", idx + 1))?;
        out.push(booking);
    }
    Ok(out)
}

fn cmd_login(
    session: &mut SessionContext,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let username = args
        .first()
        .ok_or_else(|| anyhow!("login requires a username"))?;
    session.login(username, now);
    println!("Logged in as {username}");
    Ok(())
}

fn cmd_whoami(session: &SessionContext) -> anyhow::Result<()> {
    match session.current_user() {
        Some(user) => println!("{user}"),
        None => println!("not logged in"),
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<(String, String)> = cfg
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: innkeep [filter] <command> [args]");
    println!();
    println!("bookings:   add modify cancel checkin checkout list info note");
    println!("calendar:   calendar arrivals departures");
    println!("rooms:      rooms addroom clean dirty");
    println!("directory:  owners addowner users adduser");
    println!("expenses:   expenses addexpense");
    println!("data:       undo export import");
    println!("session:    login logout whoami");
    println!("other:      _show help version");
    println!();
    println!("filters:    free text, status:<token>, from:<day>, to:<day>, <id>");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    use super::{cmd_add, cmd_modify, cmd_note, expand_command_abbrev, known_command_names, split_modifiers};
    use crate::booking::{Booking, BookingStatus};
    use crate::datastore::DataStore;
    use crate::filter::Criteria;
    use crate::interval::DateInterval;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn seeded_store(temp: &tempfile::TempDir) -> (DataStore, chrono::DateTime<Utc>) {
        let store = DataStore::open(temp.path()).expect("open datastore");
        let now = Utc
            .with_ymd_and_hms(2023, 11, 1, 9, 0, 0)
            .single()
            .expect("valid now");

        let stay = DateInterval::new(
            NaiveDate::from_ymd_opt(2023, 11, 5).expect("date"),
            NaiveDate::from_ymd_opt(2023, 11, 8).expect("date"),
        )
        .expect("interval");
        let booking = Booking::new_confirmed("Ada".to_string(), "101".to_string(), stay, now, 1);
        store.add_booking(vec![], booking).expect("add booking");

        (store, now)
    }

    #[test]
    fn failed_modify_leaves_the_undo_stack_alone() {
        let temp = tempdir().expect("tempdir");
        let (mut store, now) = seeded_store(&temp);

        let criteria = Criteria::parse(&strings(&["1"]), now).expect("criteria");
        let result = cmd_modify(&mut store, &criteria, &strings(&["rate:not-a-number"]), now);
        assert!(result.is_err());

        // a failed modify must not leave a no-op snapshot for the next undo
        assert!(store.pop_undo_snapshot().expect("pop").is_none());
        let loaded = store.load_bookings().expect("load");
        assert_eq!(loaded[0].rate, None);
        assert_eq!(loaded[0].status, BookingStatus::Confirmed);
    }

    #[test]
    fn failed_add_leaves_the_undo_stack_alone() {
        let temp = tempdir().expect("tempdir");
        let mut store = DataStore::open(temp.path()).expect("open datastore");
        let now = Utc
            .with_ymd_and_hms(2023, 11, 1, 9, 0, 0)
            .single()
            .expect("valid now");

        let args = strings(&["Ada", "room:101", "from:2023-11-05", "to:2023-11-08", "rate:lots"]);
        assert!(cmd_add(&mut store, &args, now).is_err());

        assert!(store.pop_undo_snapshot().expect("pop").is_none());
        assert!(store.load_bookings().expect("load").is_empty());
    }

    #[test]
    fn successful_modify_snapshots_the_prior_state() {
        let temp = tempdir().expect("tempdir");
        let (mut store, now) = seeded_store(&temp);

        let criteria = Criteria::parse(&strings(&["1"]), now).expect("criteria");
        cmd_modify(&mut store, &criteria, &strings(&["rate:90"]), now).expect("modify");

        assert_eq!(store.load_bookings().expect("load")[0].rate, Some(90.0));
        let (snapshot, _) = store
            .pop_undo_snapshot()
            .expect("pop")
            .expect("snapshot present");
        assert_eq!(snapshot[0].rate, None);
    }

    #[test]
    fn note_annotates_only_selected_bookings() {
        let temp = tempdir().expect("tempdir");
        let (mut store, now) = seeded_store(&temp);

        let stay = DateInterval::new(
            NaiveDate::from_ymd_opt(2023, 11, 10).expect("date"),
            NaiveDate::from_ymd_opt(2023, 11, 12).expect("date"),
        )
        .expect("interval");
        let other = Booking::new_confirmed("Grace".to_string(), "204".to_string(), stay, now, 2);
        let bookings = store.load_bookings().expect("load");
        store.add_booking(bookings, other).expect("add booking");

        let criteria = Criteria::parse(&strings(&["1"]), now).expect("criteria");
        cmd_note(&mut store, &criteria, &strings(&["late", "arrival"]), now).expect("note");

        let loaded = store.load_bookings().expect("load");
        assert_eq!(loaded[0].notes.len(), 1);
        assert_eq!(loaded[0].notes[0].text, "late arrival");
        assert!(loaded[1].notes.is_empty());
    }

    #[test]
    fn unique_prefixes_expand() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("who", &known), Some("whoami"));
        assert_eq!(expand_command_abbrev("list", &known), Some("list"));
        // ambiguous between checkin/checkout
        assert_eq!(expand_command_abbrev("check", &known), None);
        assert_eq!(expand_command_abbrev("xyzzy", &known), None);
    }

    #[test]
    fn modifiers_split_from_free_words() {
        let args: Vec<String> = vec![
            "Grace".to_string(),
            "Hopper".to_string(),
            "room:204".to_string(),
            "from:2023-11-05".to_string(),
            "note:with colon".to_string(),
        ];
        let (words, modifiers) = split_modifiers(&args, &["room", "from", "to"]);

        assert_eq!(words, vec!["Grace", "Hopper", "note:with colon"]);
        assert_eq!(modifiers.get("room").map(String::as_str), Some("204"));
        assert_eq!(
            modifiers.get("from").map(String::as_str),
            Some("2023-11-05")
        );
    }
}
