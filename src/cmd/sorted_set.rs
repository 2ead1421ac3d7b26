//! # Sorted set commands
//!
//! `zadd key score member` and friends. Ranges are expressed as ascending
//! ranks unless `reverse` is set, in which case rank 0 is the
//! highest-scoring member. `zrangebyscore`/`zrevrangebyscore` take a
//! mandatory `offset count` pagination pair rather than an open-ended
//! range, matching their fixed six-argument arity.
use crate::cmd::{commit, CommandOutcome, Invocation, ReturnCodeSlot, ReturnItem};
use crate::db::Database;
use crate::error::{Error, ReturnCode};
use crate::value::{bytes_to_int, bytes_to_number, Value};
use std::ops::Bound;

fn normalize_rank(idx: i64, len: usize) -> usize {
    if idx < 0 {
        (len as i64 + idx).max(0) as usize
    } else {
        (idx as usize).min(len)
    }
}

/// `zadd key score member`: a new member is refused with `DATA_LEN_LIMITED`
/// once the set is at its hard cap; re-scoring an existing member always
/// succeeds.
pub fn zadd(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let score: f64 = bytes_to_number(&inv.argv[2])?;
    let member = inv.argv[3].clone();
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::sorted_set(),
    };
    let zset = val.as_sorted_set_mut()?;
    let was_new = zset.set().score(&member).is_none();
    if was_new && zset.set().len() >= inv.config.zset_max_size {
        return Ok(CommandOutcome {
            code: Some(ReturnCodeSlot(ReturnCode::ErrDataLenLimited)),
            scalar: Some(ReturnItem::Integer(zset.set().len() as i64)),
            items: Vec::new(),
        });
    }
    zset.with_mut(&inv.config, |s| s.insert(score, member));
    commit(db, inv, key, val)?;
    Ok(CommandOutcome::bool_flag(was_new))
}

/// `zincrby key increment member`.
pub fn zincrby(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let delta: f64 = bytes_to_number(&inv.argv[2])?;
    let member = inv.argv[3].clone();
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::sorted_set(),
    };
    let zset = val.as_sorted_set_mut()?;
    let new_score = zset.with_mut(&inv.config, |s| s.incr(member, delta));
    commit(db, inv, key, val)?;
    Ok(CommandOutcome::double(new_score))
}

/// `zrem key member`.
pub fn zrem(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let member = &inv.argv[2];
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let zset = val.as_sorted_set_mut()?;
    let removed = zset.set_mut(&inv.config).remove(member);
    if zset.set().is_empty() {
        db.delete(key);
    } else if removed {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::bool_flag(removed))
}

/// `zremrangebyscore key min max`.
pub fn zremrangebyscore(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let min: f64 = bytes_to_number(&inv.argv[2])?;
    let max: f64 = bytes_to_number(&inv.argv[3])?;
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::integer(0)),
    };
    let zset = val.as_sorted_set_mut()?;
    let removed = zset.set_mut(&inv.config).remove_by_score(Bound::Included(min), Bound::Included(max));
    if zset.set().is_empty() {
        db.delete(key);
    } else if removed > 0 {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::integer(removed as i64))
}

/// `zremrangebyrank key start stop`.
pub fn zremrangebyrank(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let start = bytes_to_int(&inv.argv[2])?;
    let stop = bytes_to_int(&inv.argv[3])?;
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::integer(0)),
    };
    let zset = val.as_sorted_set_mut()?;
    let len = zset.set().len();
    let (lo, hi) = (normalize_rank(start, len), normalize_rank(stop, len));
    let removed = if lo > hi || lo >= len {
        0
    } else {
        zset.set_mut(&inv.config).remove_by_rank(lo, hi.min(len.saturating_sub(1)))
    };
    if zset.set().is_empty() {
        db.delete(key);
    } else if removed > 0 {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::integer(removed as i64))
}

fn members_in_range(
    db: &mut Database,
    inv: &Invocation,
    key: &[u8],
    start: i64,
    stop: i64,
    reverse: bool,
) -> Result<Vec<(bytes::Bytes, f64)>, Error> {
    let zset = match db.lookup_read(key, &inv.clock) {
        Some(v) => v.as_sorted_set()?.set().members_ascending(),
        None => return Ok(Vec::new()),
    };
    let mut ordered = zset;
    if reverse {
        ordered.reverse();
    }
    let len = ordered.len();
    let lo = normalize_rank(start, len);
    let hi = normalize_rank(stop, len);
    if lo >= len || lo > hi {
        return Ok(Vec::new());
    }
    Ok(ordered[lo..=hi.min(len - 1)].to_vec())
}

/// `zrange`/`zrevrange`/`zrangewithscore`/`zrevrangewithscore key start stop`.
pub fn zrange(
    db: &mut Database,
    inv: &Invocation,
    reverse: bool,
    with_scores: bool,
) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let start = bytes_to_int(&inv.argv[2])?;
    let stop = bytes_to_int(&inv.argv[3])?;
    let members = members_in_range(db, inv, key, start, stop, reverse)?;
    let mut items = Vec::with_capacity(members.len() * if with_scores { 2 } else { 1 });
    for (member, score) in members {
        items.push(ReturnItem::Bytes(member));
        if with_scores {
            items.push(ReturnItem::Double(score));
        }
    }
    Ok(CommandOutcome::list(items))
}

/// `zrangebyscore`/`zrevrangebyscore key min max offset count`.
pub fn zrangebyscore(db: &mut Database, inv: &Invocation, reverse: bool) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let min: f64 = bytes_to_number(&inv.argv[2])?;
    let max: f64 = bytes_to_number(&inv.argv[3])?;
    let offset = bytes_to_int(&inv.argv[4])?.max(0) as usize;
    let count = bytes_to_int(&inv.argv[5])?;

    let mut members = match db.lookup_read(key, &inv.clock) {
        Some(v) => v
            .as_sorted_set()?
            .set()
            .range_by_score(Bound::Included(min), Bound::Included(max)),
        None => Vec::new(),
    };
    if reverse {
        members.reverse();
    }
    let page: Vec<(bytes::Bytes, f64)> = if offset >= members.len() {
        Vec::new()
    } else {
        let end = if count < 0 {
            members.len()
        } else {
            (offset + count as usize).min(members.len())
        };
        members[offset..end].to_vec()
    };
    let items = page.into_iter().map(|(m, _)| ReturnItem::Bytes(m)).collect();
    Ok(CommandOutcome::list(items))
}

/// `zcount key min max`.
pub fn zcount(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let min: f64 = bytes_to_number(&inv.argv[2])?;
    let max: f64 = bytes_to_number(&inv.argv[3])?;
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::integer(
            v.as_sorted_set()?.set().count_by_score(Bound::Included(min), Bound::Included(max)) as i64,
        )),
        None => Ok(CommandOutcome::integer(0)),
    }
}

/// `zcard key`.
pub fn zcard(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::integer(v.as_sorted_set()?.set().len() as i64)),
        None => Ok(CommandOutcome::integer(0)),
    }
}

/// `zscore key member`.
pub fn zscore(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let member = &inv.argv[2];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => match v.as_sorted_set()?.set().score(member) {
            Some(score) => Ok(CommandOutcome::double(score)),
            None => Ok(CommandOutcome::not_exist()),
        },
        None => Ok(CommandOutcome::not_exist()),
    }
}

/// `zrank`/`zrevrank key member`.
pub fn zrank(db: &mut Database, inv: &Invocation, reverse: bool) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let member = &inv.argv[2];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => {
            let zset = v.as_sorted_set()?.set();
            match zset.rank(member) {
                Some(rank) => {
                    let rank = if reverse { zset.len() - 1 - rank } else { rank };
                    Ok(CommandOutcome::integer(rank as i64))
                }
                None => Ok(CommandOutcome::not_exist()),
            }
        }
        None => Ok(CommandOutcome::not_exist()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test::{new_server, run};
    use crate::error::ReturnCode;

    #[test]
    fn zadd_zscore_zrank_scenario() {
        let mut server = new_server();
        run(&mut server, &["zadd", "Z", "1", "a"]);
        run(&mut server, &["zadd", "Z", "2", "b"]);
        run(&mut server, &["zadd", "Z", "3", "c"]);
        assert_eq!(run(&mut server, &["zscore", "Z", "b"]).scalar, Some(ReturnItem::Double(2.0)));
        assert_eq!(run(&mut server, &["zrank", "Z", "c"]).scalar, Some(ReturnItem::Integer(2)));
        assert_eq!(run(&mut server, &["zrevrank", "Z", "c"]).scalar, Some(ReturnItem::Integer(0)));
    }

    #[test]
    fn zincrby_accumulates() {
        let mut server = new_server();
        run(&mut server, &["zadd", "Z", "1", "a"]);
        let outcome = run(&mut server, &["zincrby", "Z", "4.5", "a"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Double(5.5)));
    }

    #[test]
    fn zrange_ascending_by_default() {
        let mut server = new_server();
        run(&mut server, &["zadd", "Z", "3", "c"]);
        run(&mut server, &["zadd", "Z", "1", "a"]);
        run(&mut server, &["zadd", "Z", "2", "b"]);
        let outcome = run(&mut server, &["zrange", "Z", "0", "-1"]);
        assert_eq!(
            outcome.items,
            vec![
                ReturnItem::Bytes(bytes::Bytes::from_static(b"a")),
                ReturnItem::Bytes(bytes::Bytes::from_static(b"b")),
                ReturnItem::Bytes(bytes::Bytes::from_static(b"c")),
            ]
        );
    }

    #[test]
    fn zadd_over_cap_returns_data_len_limited() {
        use crate::config::EngineConfig;
        use crate::server::Server;
        let mut server = Server::new(EngineConfig { zset_max_size: 1, ..EngineConfig::default() });
        run(&mut server, &["zadd", "Z", "1", "a"]);
        let outcome = run(&mut server, &["zadd", "Z", "2", "b"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrDataLenLimited);
    }

    #[test]
    fn zrem_deletes_key_once_empty() {
        let mut server = new_server();
        run(&mut server, &["zadd", "Z", "1", "a"]);
        run(&mut server, &["zrem", "Z", "a"]);
        assert_eq!(run(&mut server, &["exists", "Z"]).return_code(), ReturnCode::OkButCZero);
    }
}
