//! # String commands
//!
//! `get`, `set`, `setnx`, `setex`, `setnxex`, `getset`, `incr`, `decr`,
//! `incrby`, `decrby`. The integer-encoded-string commands store their
//! result as a 32-bit signed value: the running 64-bit sum is truncated to
//! `i32` before being stringified back, mirroring the source's explicit
//! narrowing cast rather than a true saturating clamp.
use crate::cmd::{commit, CommandOutcome, Invocation};
use crate::db::Database;
use crate::error::{Error, ReturnCode};
use crate::value::{bytes_to_int, Value};
use bytes::Bytes;

/// `get key`.
pub fn get(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::bytes(v.as_str()?.as_bytes())),
        None => Ok(CommandOutcome::not_exist()),
    }
}

/// `set key value`.
pub fn set(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let value = inv.argv[2].clone();
    commit(db, inv, key, Value::string(value))?;
    Ok(CommandOutcome::ok())
}

/// `setnx key value`.
pub fn setnx(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    if db.contains(key, &inv.clock) {
        return Ok(CommandOutcome::code(ReturnCode::OkButAlreadyExist));
    }
    let value = inv.argv[2].clone();
    commit(db, inv, key, Value::string(value))?;
    Ok(CommandOutcome::ok())
}

/// `setex key seconds value`: sets the key and installs a duration TTL in
/// one step.
pub fn setex(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let seconds = bytes_to_int(&inv.argv[2])?;
    let value = inv.argv[3].clone();
    let version = db.prepare_key(key, inv.version_care, inv.version_in)?;
    db.super_replace(key, Value::string(value), version, &inv.clock);
    db.set_expire(key, inv.clock.now + seconds);
    Ok(CommandOutcome::ok())
}

/// `setnxex key seconds value`: `setex`, but conditional on the key being
/// absent.
pub fn setnxex(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    if db.contains(key, &inv.clock) {
        return Ok(CommandOutcome::code(ReturnCode::OkButAlreadyExist));
    }
    let seconds = bytes_to_int(&inv.argv[2])?;
    let value = inv.argv[3].clone();
    let version = db.prepare_key(key, inv.version_care, inv.version_in)?;
    db.super_replace(key, Value::string(value), version, &inv.clock);
    db.set_expire(key, inv.clock.now + seconds);
    Ok(CommandOutcome::ok())
}

/// `getset key value`: returns the previous value (`OK_NOT_EXIST` if there
/// was none) and installs the new one.
pub fn getset(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let old = match db.lookup_read(key, &inv.clock) {
        Some(v) => Some(v.as_str()?.as_bytes()),
        None => None,
    };
    let value = inv.argv[2].clone();
    commit(db, inv, key, Value::string(value))?;
    Ok(match old {
        Some(b) => CommandOutcome::bytes(b),
        None => CommandOutcome::not_exist(),
    })
}

fn incr_generic(db: &mut Database, inv: &Invocation, key: &[u8], init: i64, delta: i64) -> Result<CommandOutcome, Error> {
    let base = match db.lookup_read(key, &inv.clock) {
        Some(v) => bytes_to_int(&v.as_str()?.as_bytes())?,
        None => init,
    };
    let sum = base.checked_add(delta).ok_or(Error::IncrDecrOverflow)?;
    let truncated = (sum as i32) as i64;
    commit(db, inv, key, Value::string(Bytes::from(truncated.to_string())))?;
    Ok(CommandOutcome::integer(truncated))
}

/// `incr key`.
pub fn incr(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    incr_generic(db, inv, &inv.argv[1].clone(), 0, 1)
}

/// `decr key`.
pub fn decr(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    incr_generic(db, inv, &inv.argv[1].clone(), 0, -1)
}

/// `incrby key init incr`: adds `incr` to the key's current value, or to
/// `init` if the key is absent.
pub fn incrby(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let init = bytes_to_int(&inv.argv[2])?;
    let delta = bytes_to_int(&inv.argv[3])?;
    incr_generic(db, inv, &inv.argv[1].clone(), init, delta)
}

/// `decrby key by`.
pub fn decrby(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let by = bytes_to_int(&inv.argv[2])?;
    incr_generic(db, inv, &inv.argv[1].clone(), 0, -by)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test::{new_server, run};
    use crate::cmd::ReturnItem;

    #[test]
    fn set_get_round_trip() {
        let mut server = new_server();
        run(&mut server, &["set", "foo", "bar"]);
        let outcome = run(&mut server, &["get", "foo"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Bytes(Bytes::from_static(b"bar"))));
    }

    #[test]
    fn setnx_refuses_when_present() {
        let mut server = new_server();
        run(&mut server, &["set", "k", "v"]);
        let outcome = run(&mut server, &["setnx", "k", "v2"]);
        assert_eq!(outcome.return_code(), ReturnCode::OkButAlreadyExist);
        assert_eq!(run(&mut server, &["get", "k"]).scalar, Some(ReturnItem::Bytes(Bytes::from_static(b"v"))));
    }

    #[test]
    fn incrby_uses_init_when_absent_then_adds_delta() {
        let mut server = new_server();
        let outcome = run(&mut server, &["incrby", "counter", "10", "5"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(15)));
        let outcome = run(&mut server, &["incrby", "counter", "10", "5"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(20)));
    }

    #[test]
    fn incr_on_non_integer_errors() {
        let mut server = new_server();
        run(&mut server, &["set", "k", "not-a-number"]);
        let outcome = run(&mut server, &["incr", "k"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrIsNotInteger);
    }

    #[test]
    fn getset_returns_previous_value() {
        let mut server = new_server();
        assert_eq!(run(&mut server, &["getset", "k", "a"]).return_code(), ReturnCode::OkNotExist);
        let outcome = run(&mut server, &["getset", "k", "b"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Bytes(Bytes::from_static(b"a"))));
    }
}
