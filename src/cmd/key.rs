//! # Generic key commands
//!
//! Type-agnostic operations: `del`, `exists`, `type`, `expire`, `ttl`,
//! `persist`.
use crate::cmd::{CommandOutcome, Invocation};
use crate::db::{Database, TtlResult};
use crate::error::Error;
use crate::value::bytes_to_int;
use bytes::Bytes;

/// `del key [key ...]`.
pub fn del(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let mut count = 0i64;
    for key in &inv.argv[1..] {
        if db.delete(key) {
            count += 1;
        }
    }
    Ok(if count == 0 {
        CommandOutcome::not_exist()
    } else {
        CommandOutcome::integer(count)
    })
}

/// `exists key`.
pub fn exists(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    Ok(CommandOutcome::bool_flag(db.contains(key, &inv.clock)))
}

/// `type key`.
pub fn type_cmd(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    match db.lookup_read(key, &inv.clock) {
        Some(v) => Ok(CommandOutcome::bytes(Bytes::from(v.typ().to_string()))),
        None => Ok(CommandOutcome::not_exist()),
    }
}

/// `expire key seconds`, implementing the condensed X-expire protocol:
/// negative is a no-op, zero persists, a small positive value is a
/// duration, a large one is an absolute timestamp. A missing key always
/// reports `NOT_EXIST`, regardless of the sign of `seconds`.
pub fn expire(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    let seconds = bytes_to_int(&inv.argv[2])?;
    if !db.contains(key, &inv.clock) {
        return Ok(CommandOutcome::not_exist());
    }
    if seconds < 0 {
        return Ok(CommandOutcome::ok());
    }
    let applied = db.expire_xgeneric(key, seconds, &inv.clock);
    Ok(if applied {
        CommandOutcome::ok()
    } else {
        CommandOutcome::not_exist()
    })
}

/// `ttl key`.
pub fn ttl(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    Ok(match db.ttl(key, &inv.clock) {
        TtlResult::Remaining(n) => CommandOutcome::integer(n),
        TtlResult::NoTtl => CommandOutcome::integer(0),
        TtlResult::NotExist => CommandOutcome::not_exist(),
    })
}

/// `persist key`.
pub fn persist(db: &mut Database, inv: &Invocation) -> Result<CommandOutcome, Error> {
    let key = &inv.argv[1];
    if !db.contains(key, &inv.clock) {
        return Ok(CommandOutcome::not_exist());
    }
    Ok(CommandOutcome::bool_flag(db.remove_expire(key)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test::{new_server, run};
    use crate::error::ReturnCode;

    #[test]
    fn del_reports_not_exist_when_nothing_removed() {
        let mut server = new_server();
        let outcome = run(&mut server, &["del", "missing"]);
        assert_eq!(outcome.return_code(), ReturnCode::OkNotExist);
    }

    #[test]
    fn del_is_idempotent() {
        let mut server = new_server();
        run(&mut server, &["set", "k", "v"]);
        assert_eq!(run(&mut server, &["del", "k"]).return_code(), ReturnCode::Ok);
        assert_eq!(run(&mut server, &["del", "k"]).return_code(), ReturnCode::OkNotExist);
    }

    #[test]
    fn expire_on_missing_key_is_not_exist_regardless_of_sign() {
        let mut server = new_server();
        assert_eq!(run(&mut server, &["expire", "missing", "-1"]).return_code(), ReturnCode::OkNotExist);
        assert_eq!(run(&mut server, &["expire", "missing", "0"]).return_code(), ReturnCode::OkNotExist);
        assert_eq!(run(&mut server, &["expire", "missing", "5"]).return_code(), ReturnCode::OkNotExist);
    }

    #[test]
    fn expire_negative_is_a_no_op_on_an_existing_key() {
        let mut server = new_server();
        run(&mut server, &["set", "k", "v"]);
        let outcome = run(&mut server, &["expire", "k", "-1"]);
        assert_eq!(outcome.return_code(), ReturnCode::Ok);
    }

    #[test]
    fn ttl_three_way_outcome() {
        let mut server = new_server();
        assert_eq!(run(&mut server, &["ttl", "missing"]).return_code(), ReturnCode::OkNotExist);
        run(&mut server, &["set", "k", "v"]);
        assert_eq!(run(&mut server, &["ttl", "k"]).return_code(), ReturnCode::Ok);
    }

    #[test]
    fn type_reports_value_kind() {
        let mut server = new_server();
        run(&mut server, &["set", "k", "v"]);
        let outcome = run(&mut server, &["type", "k"]);
        assert_eq!(outcome.scalar, Some(crate::cmd::ReturnItem::Bytes(Bytes::from_static(b"string"))));
    }
}
