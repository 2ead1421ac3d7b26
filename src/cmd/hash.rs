//! # Hash commands
//!
//! `hset`, `hsetnx`, `hget`, `hmset`, `hmget`, `hdel`, `hlen`, `hkeys`,
//! `hvals`, `hgetall`, `hexists`, `hincrby` (with the same 32-bit
//! truncating-cast behaviour as the string `incr` family).
use crate::cmd::{commit, CommandOutcome, Invocation, ReturnCode, ReturnCodeSlot, ReturnItem};
use crate::db::Database;
use crate::error::Error;
use crate::value::{bytes_to_int, Value};
use bytes::Bytes;

fn data_len_limited(len: usize) -> CommandOutcome {
    CommandOutcome {
        code: Some(ReturnCodeSlot(ReturnCode::ErrDataLenLimited)),
        scalar: Some(ReturnItem::Integer(len as i64)),
        items: Vec::new(),
    }
}

/// `hset key field value`: refuses a new field once the hash is at its hard
/// cap, but an overwrite of an existing field always succeeds.
pub fn hset(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let field = inv.argv[2].clone();
    let value = inv.argv[3].clone();
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::hash(),
    };
    let hash = val.as_hash_mut()?;
    let is_new = !hash.fields().contains_key(&field);
    if is_new && hash.len() >= inv.config.hash_max_size {
        return Ok(data_len_limited(hash.len()));
    }
    hash.set(field, value, &inv.config);
    commit(db, inv, key, val)?;
    Ok(CommandOutcome::bool_flag(is_new))
}

/// `hsetnx key field value`.
pub fn hsetnx(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let field = inv.argv[2].clone();
    let value = inv.argv[3].clone();
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::hash(),
    };
    let hash = val.as_hash_mut()?;
    if hash.fields().contains_key(&field) {
        return Ok(CommandOutcome::code(ReturnCode::OkButAlreadyExist));
    }
    if hash.len() >= inv.config.hash_max_size {
        return Ok(data_len_limited(hash.len()));
    }
    hash.set(field, value, &inv.config);
    commit(db, inv, key, val)?;
    Ok(CommandOutcome::ok())
}

/// `hget key field`.
pub fn hget(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let field = &inv.argv[2];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => match v.as_hash()?.fields().get(field.as_ref()) {
            Some(value) => Ok(CommandOutcome::bytes(value.clone())),
            None => Ok(CommandOutcome::not_exist()),
        },
        None => Ok(CommandOutcome::not_exist()),
    }
}

/// `hmset key field value [field value ...]`: truncates once the hash
/// reaches its hard cap, reporting `DATA_LEN_LIMITED` with the final size.
pub fn hmset(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    if (inv.argv.len() - 2) % 2 != 0 {
        return Err(Error::Syntax);
    }
    let key = &inv.argv[1];
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::hash(),
    };
    let hash = val.as_hash_mut()?;
    let cap = inv.config.hash_max_size;
    let mut capped = false;
    for pair in inv.argv[2..].chunks_exact(2) {
        if !hash.fields().contains_key(&pair[0]) && hash.len() >= cap {
            capped = true;
            break;
        }
        hash.set(pair[0].clone(), pair[1].clone(), &inv.config);
    }
    let len = hash.len();
    commit(db, inv, key, val)?;
    if capped {
        Ok(data_len_limited(len))
    } else {
        Ok(CommandOutcome::ok())
    }
}

/// `hmget key field [field ...]`.
pub fn hmget(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let hash = match db.lookup_read(key, &inv.clock) {
        Some(v) => Some(v.as_hash()?.fields().clone()),
        None => None,
    };
    let items = inv.argv[2..]
        .iter()
        .map(|f| match &hash {
            Some(h) => h.get(f.as_ref()).cloned().map(ReturnItem::Bytes),
            None => None,
        })
        .collect::<Vec<_>>();
    let resolved: Vec<ReturnItem> = items.into_iter().flatten().collect();
    Ok(CommandOutcome::list(resolved))
}

/// `hincrby key field delta`.
pub fn hincrby(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let field = inv.argv[2].clone();
    let delta = bytes_to_int(&inv.argv[3])?;
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => Value::hash(),
    };
    let hash = val.as_hash_mut()?;
    let base = match hash.fields().get(field.as_ref()) {
        Some(b) => bytes_to_int(b)?,
        None => 0,
    };
    let sum = base.checked_add(delta).ok_or(Error::IncrDecrOverflow)?;
    let truncated = (sum as i32) as i64;
    hash.set(field, Bytes::from(truncated.to_string()), &inv.config);
    commit(db, inv, key, val)?;
    Ok(CommandOutcome::integer(truncated))
}

/// `hdel key field [field ...]`.
pub fn hdel(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let mut val = match db.lookup_write(key, &inv.clock) {
        Some(v) => v.clone(),
        None => return Ok(CommandOutcome::not_exist()),
    };
    let hash = val.as_hash_mut()?;
    let mut removed = 0i64;
    for field in &inv.argv[2..] {
        if hash.remove(field).is_some() {
            removed += 1;
        }
    }
    if hash.is_empty() {
        db.delete(key);
    } else {
        commit(db, inv, key, val)?;
    }
    Ok(CommandOutcome::integer(removed))
}

/// `hlen key`.
pub fn hlen(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::integer(v.as_hash()?.len() as i64)),
        None => Ok(CommandOutcome::integer(0)),
    }
}

/// `hkeys key`.
pub fn hkeys(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::list(
            v.as_hash()?.fields().keys().cloned().map(ReturnItem::Bytes).collect(),
        )),
        None => Ok(CommandOutcome::list(Vec::new())),
    }
}

/// `hvals key`.
pub fn hvals(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::list(
            v.as_hash()?.fields().values().cloned().map(ReturnItem::Bytes).collect(),
        )),
        None => Ok(CommandOutcome::list(Vec::new())),
    }
}

/// `hgetall key`.
pub fn hgetall(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => {
            let items = v
                .as_hash()?
                .fields()
                .iter()
                .flat_map(|(f, val)| [ReturnItem::Bytes(f.clone()), ReturnItem::Bytes(val.clone())])
                .collect();
            Ok(CommandOutcome::list(items))
        }
        None => Ok(CommandOutcome::list(Vec::new())),
    }
}

/// `hexists key field`.
pub fn hexists(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let field = &inv.argv[2];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::bool_flag(v.as_hash()?.fields().contains_key(field.as_ref()))),
        None => Ok(CommandOutcome::bool_flag(false)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test::{new_server, run};

    #[test]
    fn hset_hincrby_hget_scenario() {
        let mut server = new_server();
        run(&mut server, &["hset", "H", "f", "1"]);
        let outcome = run(&mut server, &["hincrby", "H", "f", "10"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(11)));
        let outcome = run(&mut server, &["hget", "H", "f"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Bytes(Bytes::from_static(b"11"))));
    }

    #[test]
    fn hincrby_on_non_numeric_delta_errors() {
        let mut server = new_server();
        run(&mut server, &["hset", "H", "f", "11"]);
        let outcome = run(&mut server, &["hincrby", "H", "f", "x"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrIsNotInteger);
    }

    #[test]
    fn hdel_deletes_key_when_last_field_removed() {
        let mut server = new_server();
        run(&mut server, &["hset", "H", "f", "v"]);
        run(&mut server, &["hdel", "H", "f"]);
        assert_eq!(run(&mut server, &["exists", "H"]).return_code(), ReturnCode::OkButCZero);
    }

    #[test]
    fn hmset_over_cap_truncates() {
        use crate::config::EngineConfig;
        use crate::server::Server;
        let mut server = Server::new(EngineConfig { hash_max_size: 1, ..EngineConfig::default() });
        let outcome = run(&mut server, &["hmset", "H", "a", "1", "b", "2"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrDataLenLimited);
        assert_eq!(run(&mut server, &["hlen", "H"]).scalar, Some(ReturnItem::Integer(1)));
    }

    #[test]
    fn hsetnx_refuses_existing_field() {
        let mut server = new_server();
        run(&mut server, &["hset", "H", "f", "v"]);
        let outcome = run(&mut server, &["hsetnx", "H", "f", "v2"]);
        assert_eq!(outcome.return_code(), ReturnCode::OkButAlreadyExist);
    }
}
