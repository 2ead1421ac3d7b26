//! # Set commands
//!
//! `sadd`, `srem`, `sismember`, `scard`, `spop`, `smove`, `sinter`,
//! `sinterstore`, `smembers` (a thin alias over `sinter` with a single set
//! argument). A set that becomes empty through `srem`/`spop`/`smove` is
//! deleted outright.
use crate::cmd::{commit, CommandOutcome, Invocation, ReturnCodeSlot, ReturnItem};
use crate::db::Database;
use crate::error::{Error, ReturnCode};
use crate::value::Value;
use bytes::Bytes;
use rand::Rng;
use std::collections::HashSet;

/// `sadd key member [member ...]`: stops and reports `DATA_LEN_LIMITED`
/// once the set reaches its hard cap, keeping whatever was added so far.
pub fn sadd(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::set(),
    };
    let set = val.as_set_mut()?;
    let cap = inv.config.set_max_size;
    let mut added = 0i64;
    let mut capped = false;
    for member in &inv.argv[2..] {
        if set.len() >= cap {
            capped = true;
            break;
        }
        if set.insert(member.clone(), &inv.config) {
            added += 1;
        }
    }
    commit(db, inv, key, val)?;
    if capped {
        Ok(CommandOutcome {
            code: Some(ReturnCodeSlot(ReturnCode::ErrDataLenLimited)),
            scalar: Some(ReturnItem::Integer(added)),
            items: Vec::new(),
        })
    } else {
        Ok(CommandOutcome::integer(added))
    }
}

/// `srem key member [member ...]`.
pub fn srem(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let set = val.as_set_mut()?;
    let mut removed = 0i64;
    for member in &inv.argv[2..] {
        if set.remove(member) {
            removed += 1;
        }
    }
    if set.is_empty() {
        db.delete(key);
    } else {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::integer(removed))
}

/// `sismember key member`.
pub fn sismember(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let member = &inv.argv[2];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::bool_flag(v.as_set()?.contains(member))),
        None => Ok(CommandOutcome::bool_flag(false)),
    }
}

/// `scard key`.
pub fn scard(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::integer(v.as_set()?.len() as i64)),
        None => Ok(CommandOutcome::integer(0)),
    }
}

/// `spop key`: removes and returns one random member.
pub fn spop(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let set = val.as_set_mut()?;
    if set.is_empty() {
        return Ok(CommandOutcome::not_exist());
    }
    let members: Vec<Bytes> = set.members().iter().cloned().collect();
    let idx = rand::thread_rng().gen_range(0..members.len());
    let member = members[idx].clone();
    set.remove(&member);
    if set.is_empty() {
        db.delete(key);
    } else {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::bytes(member))
}

/// `smove source destination member`.
pub fn smove(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let source_key = &inv.argv[1];
    let dest_key = inv.argv[2].clone();
    let member = inv.argv[3].clone();

    let mut source = match db.lookup_write(source_key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::bool_flag(false)),
    };
    let source_set = source.as_set_mut()?;
    if !source_set.remove(&member) {
        return Ok(CommandOutcome::bool_flag(false));
    }

    let source_empty = source_set.is_empty();
    if source_empty {
        db.delete(source_key);
    } else {
        let version = db.prepare_key(source_key, inv.version_care, inv.version_in)?;
        db.super_replace(source_key, source, version, &inv.clock);
    }

    let mut dest = match db.lookup_write(&dest_key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::set(),
    };
    dest.as_set_mut()?.insert(member, &inv.config);
    let dest_version = db.prepare_key(&dest_key, false, 0)?;
    db.super_replace(&dest_key, dest, dest_version, &inv.clock);
    Ok(CommandOutcome::bool_flag(true))
}

fn members_of(db: &mut Database, inv: &Invocation, key: &[u8]) -> Result<HashSet<Bytes>, Error> {
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(v.as_set()?.members().clone()),
        None => Ok(HashSet::new()),
    }
}

/// `sinter key [key ...]`.
pub fn sinter(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let mut acc = members_of(db, inv, &inv.argv[1])?;
    for key in &inv.argv[2..] {
        if acc.is_empty() {
            break;
        }
        let other = members_of(db, inv, key)?;
        acc.retain(|m| other.contains(m));
    }
    Ok(CommandOutcome::list(acc.into_iter().map(ReturnItem::Bytes).collect()))
}

/// `smembers key`: `sinter` with a single set argument.
pub fn smembers(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    sinter(db, inv)
}

/// `sinterstore destination key [key ...]`.
pub fn sinterstore(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let dest_key = inv.argv[1].clone();
    let mut acc = members_of(db, inv, &inv.argv[2])?;
    for key in &inv.argv[3..] {
        if acc.is_empty() {
            break;
        }
        let other = members_of(db, inv, key)?;
        acc.retain(|m| other.contains(m));
    }
    let len = acc.len();
    if acc.is_empty() {
        db.delete(&dest_key);
    } else {
        let mut value = Value::set();
        let set = value.as_set_mut()?;
        for member in acc {
            set.insert(member, &inv.config);
        }
        let version = db.prepare_key(&dest_key, inv.version_care, inv.version_in)?;
        db.super_replace(&dest_key, value, version, &inv.clock);
    }
    Ok(CommandOutcome::integer(len as i64))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test::{new_server, run};
    use crate::error::ReturnCode;

    #[test]
    fn sadd_then_sismember() {
        let mut server = new_server();
        run(&mut server, &["sadd", "S", "a", "b", "a"]);
        assert_eq!(run(&mut server, &["scard", "S"]).scalar, Some(ReturnItem::Integer(2)));
        assert_eq!(
            run(&mut server, &["sismember", "S", "a"]).return_code(),
            ReturnCode::OkButCOne
        );
        assert_eq!(
            run(&mut server, &["sismember", "S", "z"]).return_code(),
            ReturnCode::OkButCZero
        );
    }

    #[test]
    fn srem_deletes_key_once_empty() {
        let mut server = new_server();
        run(&mut server, &["sadd", "S", "a"]);
        run(&mut server, &["srem", "S", "a"]);
        assert_eq!(run(&mut server, &["exists", "S"]).return_code(), ReturnCode::OkButCZero);
    }

    #[test]
    fn sinter_across_two_sets() {
        let mut server = new_server();
        run(&mut server, &["sadd", "A", "a", "b", "c"]);
        run(&mut server, &["sadd", "B", "b", "c", "d"]);
        let outcome = run(&mut server, &["sinter", "A", "B"]);
        let mut got: Vec<_> = outcome.items.into_iter().collect();
        got.sort_by_key(|i| match i {
            ReturnItem::Bytes(b) => b.clone(),
            _ => unreachable!(),
        });
        assert_eq!(
            got,
            vec![ReturnItem::Bytes(Bytes::from_static(b"b")), ReturnItem::Bytes(Bytes::from_static(b"c"))]
        );
    }

    #[test]
    fn sadd_over_cap_returns_data_len_limited() {
        use crate::config::EngineConfig;
        use crate::server::Server;
        let mut server = Server::new(EngineConfig { set_max_size: 2, ..EngineConfig::default() });
        let outcome = run(&mut server, &["sadd", "S", "a", "b", "c"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrDataLenLimited);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(2)));
    }

    #[test]
    fn smove_moves_member_between_sets() {
        let mut server = new_server();
        run(&mut server, &["sadd", "A", "a"]);
        let outcome = run(&mut server, &["smove", "A", "B", "a"]);
        assert_eq!(outcome.return_code(), ReturnCode::OkButCOne);
        assert_eq!(run(&mut server, &["sismember", "B", "a"]).return_code(), ReturnCode::OkButCOne);
        assert_eq!(run(&mut server, &["exists", "A"]).return_code(), ReturnCode::OkButCZero);
    }
}
