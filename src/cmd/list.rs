//! # List commands
//!
//! `lpush`/`rpush`/`lpushx`/`rpushx`, `linsert`, `lpop`/`rpop` (with a
//! multi-pop count), `llen`, `lindex`, `lset`, `lrange`, `ltrim`, `lrem`. A
//! list that becomes empty through a pop/trim/rem is deleted outright
//! rather than kept around as an empty value.
use crate::cmd::{commit, CommandOutcome, Invocation, ReturnCodeSlot, ReturnItem};
use crate::db::Database;
use crate::error::{Error, ReturnCode};
use crate::value::{bytes_to_int, Value};
use bytes::Bytes;
use std::collections::VecDeque;

fn normalize_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
    let norm = |i: i64| if i < 0 { (i + len).max(0) } else { i.min(len) };
    let lo = norm(start);
    let mut hi = if stop < 0 { stop + len } else { stop };
    if hi >= len {
        hi = len - 1;
    }
    (lo, hi)
}

/// `rpush`/`lpush`/`rpushx`/`lpushx`, selected by `front` and
/// `only_if_exists`.
pub fn push(db: &mut Database, inv: &Invocation, front: bool, only_if_exists: bool) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let requested = inv.argv.len() - 2;
    if only_if_exists && !db.contains(key, &inv.clock) {
        return Ok(CommandOutcome::not_exist());
    }
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::list(),
    };
    let list = val.as_list_mut()?;
    let cap = inv.config.list_max_size;
    let values = inv.argv[2..].iter().cloned();
    let pushed = list.push(front, values, cap, &inv.config);
    let len = list.len();
    commit(db, inv, key, val)?;
    if pushed < requested {
        Ok(CommandOutcome {
            code: Some(ReturnCodeSlot(ReturnCode::ErrDataLenLimited)),
            scalar: Some(ReturnItem::Integer(len as i64)),
            items: Vec::new(),
        })
    } else {
        Ok(CommandOutcome::integer(len as i64))
    }
}

/// `linsert key BEFORE|AFTER pivot value`.
pub fn linsert(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let before = match inv.argv[2].as_ref() {
        b"BEFORE" => true,
        b"AFTER" => false,
        _ => return Err(Error::Syntax),
    };
    let pivot = inv.argv[3].clone();
    let value = inv.argv[4].clone();
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let list = val.as_list_mut()?;
    let pos = match list.items().iter().position(|v| *v == pivot) {
        Some(p) => p,
        None => return Ok(CommandOutcome::not_exist()),
    };
    if list.len() >= inv.config.list_max_size {
        return Ok(CommandOutcome {
            code: Some(ReturnCodeSlot(ReturnCode::ErrDataLenLimited)),
            scalar: Some(ReturnItem::Integer(list.len() as i64)),
            items: Vec::new(),
        });
    }
    let insert_at = if before { pos } else { pos + 1 };
    list.items_mut().insert(insert_at, value);
    list.recheck_promotion(&inv.config);
    let len = list.len();
    commit(db, inv, key, val)?;
    Ok(CommandOutcome::integer(len as i64))
}

/// `rpop`/`lpop key count`.
pub fn pop(db: &mut Database, inv: &Invocation, front: bool) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let count = bytes_to_int(&inv.argv[2])?.max(0) as usize;
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let list = val.as_list_mut()?;
    let mut popped = Vec::new();
    for _ in 0..count {
        let item = if front {
            list.items_mut().pop_front()
        } else {
            list.items_mut().pop_back()
        };
        match item {
            Some(b) => popped.push(ReturnItem::Bytes(b)),
            None => break,
        }
    }
    if list.is_empty() {
        db.delete(key);
    } else {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::list(popped))
}

/// `llen key`.
pub fn llen(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::integer(v.as_list()?.len() as i64)),
        None => Ok(CommandOutcome::integer(0)),
    }
}

/// `lindex key index`.
pub fn lindex(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let index = bytes_to_int(&inv.argv[2])?;
    match db.lookup_read(key, &inv.clock) {
        Some(v) => {
            let list = v.as_list()?;
            let len = list.len() as i64;
            let idx = if index < 0 { index + len } else { index };
            if idx < 0 || idx >= len {
                Ok(CommandOutcome::not_exist())
            } else {
                Ok(CommandOutcome::bytes(list.items()[idx as usize].clone()))
            }
        }
        None => Ok(CommandOutcome::not_exist()),
    }
}

/// `lset key index value`.
pub fn lset(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let index = bytes_to_int(&inv.argv[2])?;
    let value = inv.argv[3].clone();
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let list = val.as_list_mut()?;
    let len = list.len() as i64;
    let idx = if index < 0 { index + len } else { index };
    if idx < 0 || idx >= len {
        return Err(Error::OutOfRange);
    }
    list.items_mut()[idx as usize] = value;
    list.recheck_promotion(&inv.config);
    commit(db, inv, key, val)?;
    Ok(CommandOutcome::ok())
}

/// `lrange key start stop`.
pub fn lrange(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let start = bytes_to_int(&inv.argv[2])?;
    let stop = bytes_to_int(&inv.argv[3])?;
    let items = match db.lookup_read(key, &inv.clock) {
        Some(v) => v.as_list()?.items().clone(),
        None => return Ok(CommandOutcome::list(Vec::new())),
    };
    let len = items.len() as i64;
    let (lo, hi) = normalize_range(start, stop, len);
    let out: Vec<ReturnItem> = if lo > hi || len == 0 {
        Vec::new()
    } else {
        items
            .iter()
            .skip(lo as usize)
            .take((hi - lo + 1) as usize)
            .cloned()
            .map(ReturnItem::Bytes)
            .collect()
    };
    Ok(CommandOutcome::list(out))
}

/// `ltrim key start stop`.
pub fn ltrim(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let start = bytes_to_int(&inv.argv[2])?;
    let stop = bytes_to_int(&inv.argv[3])?;
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let list = val.as_list_mut()?;
    let len = list.len() as i64;
    let (lo, hi) = normalize_range(start, stop, len);
    if lo > hi {
        db.delete(key);
        return Ok(CommandOutcome::ok());
    }
    let kept: VecDeque<Bytes> = list
        .items()
        .iter()
        .skip(lo as usize)
        .take((hi - lo + 1) as usize)
        .cloned()
        .collect();
    *list.items_mut() = kept;
    list.recheck_promotion(&inv.config);
    if list.is_empty() {
        db.delete(key);
    } else {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::ok())
}

/// `lrem key count value`: removes up to `count.abs()` occurrences of
/// `value`, front-to-back for a positive count, back-to-front for a
/// negative one, or all of them for zero.
pub fn lrem(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let count = bytes_to_int(&inv.argv[2])?;
    let target = inv.argv[3].clone();
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let list = val.as_list_mut()?;
    let limit: Option<usize> = if count == 0 { None } else { Some(count.unsigned_abs() as usize) };
    let drained: Vec<Bytes> = list.items_mut().drain(..).collect();
    let mut kept = VecDeque::new();
    let mut removed = 0usize;
    if count >= 0 {
        for item in drained {
            if limit.map_or(true, |l| removed < l) && item == target {
                removed += 1;
            } else {
                kept.push_back(item);
            }
        }
    } else {
        for item in drained.into_iter().rev() {
            if limit.map_or(true, |l| removed < l) && item == target {
                removed += 1;
            } else {
                kept.push_front(item);
            }
        }
    }
    *list.items_mut() = kept;
    list.recheck_promotion(&inv.config);
    if list.is_empty() {
        db.delete(key);
    } else {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::integer(removed as i64))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test::{new_server, run};

    #[test]
    fn push_range_pop_len_scenario() {
        let mut server = new_server();
        let outcome = run(&mut server, &["rpush", "L", "a", "b", "c"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(3)));

        let outcome = run(&mut server, &["lrange", "L", "0", "-1"]);
        assert_eq!(
            outcome.items,
            vec![
                ReturnItem::Bytes(Bytes::from_static(b"a")),
                ReturnItem::Bytes(Bytes::from_static(b"b")),
                ReturnItem::Bytes(Bytes::from_static(b"c")),
            ]
        );

        let outcome = run(&mut server, &["lpop", "L", "2"]);
        assert_eq!(
            outcome.items,
            vec![ReturnItem::Bytes(Bytes::from_static(b"a")), ReturnItem::Bytes(Bytes::from_static(b"b"))]
        );

        let outcome = run(&mut server, &["llen", "L"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(1)));
    }

    #[test]
    fn lpushx_on_missing_key_is_a_no_op() {
        let mut server = new_server();
        let outcome = run(&mut server, &["lpushx", "missing", "a"]);
        assert_eq!(outcome.return_code(), ReturnCode::OkNotExist);
    }

    #[test]
    fn lrem_negative_count_trims_from_the_tail() {
        let mut server = new_server();
        run(&mut server, &["rpush", "L", "a", "b", "a", "c", "a"]);
        let outcome = run(&mut server, &["lrem", "L", "-2", "a"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(2)));
        let outcome = run(&mut server, &["lrange", "L", "0", "-1"]);
        assert_eq!(
            outcome.items,
            vec![
                ReturnItem::Bytes(Bytes::from_static(b"a")),
                ReturnItem::Bytes(Bytes::from_static(b"b")),
                ReturnItem::Bytes(Bytes::from_static(b"c")),
            ]
        );
    }

    #[test]
    fn push_over_cap_returns_data_len_limited() {
        use crate::config::EngineConfig;
        use crate::server::Server;
        let mut server = Server::new(EngineConfig {
            list_max_size: 2,
            ..EngineConfig::default()
        });
        let outcome = run(&mut server, &["rpush", "L", "a", "b", "c"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrDataLenLimited);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(2)));
    }
}
