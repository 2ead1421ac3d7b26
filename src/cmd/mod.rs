//! # Command engine
//!
//! Looks a command up in the fixed catalogue, checks its arity and the
//! `DENY_OOM` memory gate, then dispatches to the per-type handler in
//! [`string`], [`list`], [`set`], [`hash`], [`sorted_set`], or [`generic`].
//! Every handler receives `(db, argv, version_in, expiretime_in,
//! version_care)` and returns a [`CommandOutcome`] or an [`Error`], the way
//! spec'd in the component design: errors are values, propagated with `?`
//! and converted to a [`ReturnCode`] only at this boundary.
pub mod hash;
pub mod key;
pub mod list;
pub mod set;
pub mod sorted_set;
pub mod string;

use crate::config::EngineConfig;
use crate::db::{eviction, Clock, Database};
use crate::error::{Error, ReturnCode};
use crate::server::Server;
use crate::value::Value;
use bytes::Bytes;

/// Per-command behavioural tags. Trimmed from the teacher's richer set
/// (which also carried pubsub/admin/replication tags) down to the ones the
/// memory-accounting and read/write distinction actually need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Refused once the memory budget is exhausted.
    DenyOom,
    /// Does not mutate the keyspace.
    ReadOnly,
    /// Mutates the keyspace.
    Write,
    /// O(1) or O(log n) regardless of collection size.
    Fast,
}

/// A command's argument-count contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` tokens, including the command name.
    Exact(usize),
    /// At least `n` tokens, including the command name.
    AtLeast(usize),
}

impl Arity {
    fn matches(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

/// Static metadata for one command.
pub struct CommandSpec {
    /// Case-insensitive command name.
    pub name: &'static str,
    /// Argument-count contract.
    pub arity: Arity,
    /// Behavioural tags.
    pub flags: &'static [Flag],
}

macro_rules! spec {
    ($name:literal, exact $n:literal $(, $flag:ident)*) => {
        CommandSpec { name: $name, arity: Arity::Exact($n), flags: &[$(Flag::$flag),*] }
    };
    ($name:literal, atleast $n:literal $(, $flag:ident)*) => {
        CommandSpec { name: $name, arity: Arity::AtLeast($n), flags: &[$(Flag::$flag),*] }
    };
}

/// The fixed command catalogue: name, arity, and flags for every supported
/// command. Two argument sentinels, `"BEFORE"` and `"AFTER"`, are consumed
/// literally by `linsert`.
pub static COMMANDS: &[CommandSpec] = &[
    spec!("get", exact 2, ReadOnly, Fast),
    spec!("set", exact 3, Write, DenyOom),
    spec!("setnx", exact 3, Write, DenyOom),
    spec!("setex", exact 4, Write, DenyOom),
    spec!("setnxex", exact 4, Write, DenyOom),
    spec!("getset", exact 3, Write, DenyOom),
    spec!("del", atleast 2, Write),
    spec!("exists", exact 2, ReadOnly, Fast),
    spec!("incr", exact 2, Write, DenyOom, Fast),
    spec!("decr", exact 2, Write, DenyOom, Fast),
    spec!("incrby", exact 4, Write, DenyOom, Fast),
    spec!("decrby", exact 3, Write, DenyOom, Fast),
    spec!("rpush", atleast 3, Write, DenyOom),
    spec!("lpush", atleast 3, Write, DenyOom),
    spec!("rpushx", atleast 3, Write, DenyOom),
    spec!("lpushx", atleast 3, Write, DenyOom),
    spec!("linsert", exact 5, Write, DenyOom),
    spec!("rpop", exact 3, Write),
    spec!("lpop", exact 3, Write),
    spec!("llen", exact 2, ReadOnly, Fast),
    spec!("lindex", exact 3, ReadOnly),
    spec!("lset", exact 4, Write, DenyOom),
    spec!("lrange", exact 4, ReadOnly),
    spec!("ltrim", exact 4, Write),
    spec!("lrem", exact 4, Write),
    spec!("sadd", exact 3, Write, DenyOom),
    spec!("srem", exact 3, Write),
    spec!("smove", exact 4, Write),
    spec!("sismember", exact 3, ReadOnly, Fast),
    spec!("scard", exact 2, ReadOnly, Fast),
    spec!("spop", exact 2, Write),
    spec!("sinter", atleast 2, ReadOnly, DenyOom),
    spec!("sinterstore", atleast 3, Write, DenyOom),
    spec!("smembers", exact 2, ReadOnly),
    spec!("zadd", exact 4, Write, DenyOom),
    spec!("zincrby", exact 4, Write, DenyOom),
    spec!("zrem", exact 3, Write),
    spec!("zremrangebyscore", exact 4, Write),
    spec!("zremrangebyrank", exact 4, Write),
    spec!("zrange", exact 4, ReadOnly),
    spec!("zrangebyscore", exact 6, ReadOnly),
    spec!("zrevrangebyscore", exact 6, ReadOnly),
    spec!("zcount", exact 4, ReadOnly),
    spec!("zrevrange", exact 4, ReadOnly),
    spec!("zcard", exact 2, ReadOnly, Fast),
    spec!("zscore", exact 3, ReadOnly, Fast),
    spec!("zrank", exact 3, ReadOnly),
    spec!("zrevrank", exact 3, ReadOnly),
    spec!("zrangewithscore", exact 4, ReadOnly),
    spec!("zrevrangewithscore", exact 4, ReadOnly),
    spec!("hset", exact 4, Write, DenyOom),
    spec!("hsetnx", exact 4, Write, DenyOom),
    spec!("hget", exact 3, ReadOnly, Fast),
    spec!("hmset", atleast 4, Write, DenyOom),
    spec!("hmget", atleast 3, ReadOnly),
    spec!("hincrby", exact 4, Write, DenyOom, Fast),
    spec!("hdel", exact 3, Write),
    spec!("hlen", exact 2, ReadOnly, Fast),
    spec!("hkeys", exact 2, ReadOnly),
    spec!("hvals", exact 2, ReadOnly),
    spec!("hgetall", exact 2, ReadOnly),
    spec!("hexists", exact 3, ReadOnly, Fast),
    spec!("expire", exact 3, Write, Fast),
    spec!("type", exact 2, ReadOnly, Fast),
    spec!("ttl", exact 2, ReadOnly, Fast),
    spec!("persist", exact 2, Write, Fast),
];

/// Looks a command up by case-insensitive name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// A single scalar in a command's reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnItem {
    /// Integer.
    Integer(i64),
    /// Raw bytes.
    Bytes(Bytes),
    /// Double.
    Double(f64),
}

/// A successful command's reply: its return code plus a scalar or a list of
/// items, mirroring `value_item_list`'s "one ordered list of typed items"
/// convention for multi-value replies (`mget`, range queries, multi-pop).
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    /// Positive return code; defaults to `Ok`.
    pub code: Option<ReturnCodeSlot>,
    /// Single scalar reply, when there is exactly one.
    pub scalar: Option<ReturnItem>,
    /// Ordered list reply, for multi-value commands.
    pub items: Vec<ReturnItem>,
}

/// Wrapper so `CommandOutcome::default()` doesn't have to special-case
/// `ReturnCode` (which has no meaningful default error-free variant other
/// than `Ok`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnCodeSlot(pub ReturnCode);

impl CommandOutcome {
    fn with_code(code: ReturnCode) -> Self {
        Self {
            code: Some(ReturnCodeSlot(code)),
            scalar: None,
            items: Vec::new(),
        }
    }

    /// Plain success.
    pub fn ok() -> Self {
        Self::with_code(ReturnCode::Ok)
    }

    /// Success carrying a non-`Ok` positive code (e.g.
    /// `OkButAlreadyExist`).
    pub fn code(code: ReturnCode) -> Self {
        Self::with_code(code)
    }

    /// Success carrying a single integer.
    pub fn integer(n: i64) -> Self {
        Self {
            scalar: Some(ReturnItem::Integer(n)),
            ..Self::ok()
        }
    }

    /// Success carrying a single double.
    pub fn double(n: f64) -> Self {
        Self {
            scalar: Some(ReturnItem::Double(n)),
            ..Self::ok()
        }
    }

    /// Success carrying a single byte string.
    pub fn bytes(b: Bytes) -> Self {
        Self {
            scalar: Some(ReturnItem::Bytes(b)),
            ..Self::ok()
        }
    }

    /// `OK_NOT_EXIST`: the key (or element) asked for was absent.
    pub fn not_exist() -> Self {
        Self::with_code(ReturnCode::OkNotExist)
    }

    /// `OK_BUT_CONE`/`OK_BUT_CZERO`: compact boolean success, also carried
    /// as an integer scalar for callers that want the value directly.
    pub fn bool_flag(flag: bool) -> Self {
        Self {
            code: Some(ReturnCodeSlot(if flag {
                ReturnCode::OkButCOne
            } else {
                ReturnCode::OkButCZero
            })),
            scalar: Some(ReturnItem::Integer(flag as i64)),
            items: Vec::new(),
        }
    }

    /// Success carrying a list of items, `OK_RANGE_HAVE_NONE` if the list
    /// is empty.
    pub fn list(items: Vec<ReturnItem>) -> Self {
        let code = if items.is_empty() {
            ReturnCode::OkRangeHaveNone
        } else {
            ReturnCode::Ok
        };
        Self {
            code: Some(ReturnCodeSlot(code)),
            scalar: None,
            items,
        }
    }

    /// The outcome's return code.
    pub fn return_code(&self) -> ReturnCode {
        self.code.map(|c| c.0).unwrap_or(ReturnCode::Ok)
    }
}

/// Runs a mutation through the optimistic-concurrency/commit/deferred-TTL
/// path every write command funnels through.
pub(crate) fn commit(db: &mut Database, inv: &Invocation, key: &[u8], value: Value) -> Result<(), Error> {
    let version = db.prepare_key(key, inv.version_care, inv.version_in)?;
    db.super_replace(key, value, version, &inv.clock);
    db.apply_deferred_ttl(key, inv.expiretime_in);
    Ok(())
}

fn outcome_or_error(result: Result<CommandOutcome, Error>) -> CommandOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => CommandOutcome::with_code(err.into()),
    }
}

/// Everything a handler needs beyond the raw argument vector.
pub struct Invocation<'a> {
    /// Full argument vector, including the command name at index 0.
    pub argv: &'a [Bytes],
    /// Client-supplied expected version for optimistic concurrency.
    pub version_in: u16,
    /// Whether the client wants the version check enforced.
    pub version_care: bool,
    /// Deferred-TTL argument applied after a successful mutation.
    pub expiretime_in: i64,
    /// Time/LRU context for this invocation.
    pub clock: Clock,
    /// Encoding-threshold and size-cap configuration, snapshotted for this
    /// invocation.
    pub config: EngineConfig,
}

/// A rough proxy for "bytes used" until the real allocator-accounting shim
/// exists: key count. Good enough to drive the DENY_OOM/eviction control
/// flow and exercise it in tests; not a byte-accurate accounting.
pub fn used_memory_proxy(db: &Database) -> u64 {
    db.len() as u64
}

fn enforce_per_db_eviction(db: &mut Database, clock: &Clock) {
    if db.max_memory == 0 {
        return;
    }
    while used_memory_proxy(db) > db.max_memory {
        let progressed = eviction::run_once(db, crate::config::EvictionPolicy::VolatileLru, clock)
            || eviction::run_once(db, crate::config::EvictionPolicy::AllkeysLru, clock);
        if !progressed {
            break;
        }
    }
}

/// Executes one command against `server`'s database `db_index`.
pub fn execute(
    server: &mut Server,
    db_index: usize,
    argv: &[Bytes],
    version_in: u16,
    version_care: bool,
    expiretime_in: i64,
    now: i64,
) -> CommandOutcome {
    if argv.is_empty() {
        return CommandOutcome::with_code(Error::Syntax.into());
    }
    let name = String::from_utf8_lossy(&argv[0]).to_lowercase();
    let spec = match lookup(&name) {
        Some(s) => s,
        None => return CommandOutcome::with_code(Error::Syntax.into()),
    };
    if !spec.arity.matches(argv.len()) {
        return CommandOutcome::with_code(Error::WrongNumberOfArguments.into());
    }

    let clock = server.clock_at(now);
    let config = server.config().clone();

    if spec.flags.contains(&Flag::DenyOom) {
        if let Err(e) = server.enforce_deny_oom(db_index, used_memory_proxy, now) {
            return CommandOutcome::with_code(e.into());
        }
    }

    let db = match server.database(db_index) {
        Ok(db) => db,
        Err(e) => return CommandOutcome::with_code(e.into()),
    };

    if spec.flags.contains(&Flag::Write) {
        enforce_per_db_eviction(db, &clock);
    }

    let invocation = Invocation {
        argv,
        version_in,
        version_care,
        expiretime_in,
        clock,
        config,
    };

    let result = match name.as_str() {
        "get" => string::get(db, &invocation),
        "set" => string::set(db, &invocation),
        "setnx" => string::setnx(db, &invocation),
        "setex" => string::setex(db, &invocation),
        "setnxex" => string::setnxex(db, &invocation),
        "getset" => string::getset(db, &invocation),
        "incr" => string::incr(db, &invocation),
        "decr" => string::decr(db, &invocation),
        "incrby" => string::incrby(db, &invocation),
        "decrby" => string::decrby(db, &invocation),
        "del" => key::del(db, &invocation),
        "exists" => key::exists(db, &invocation),
        "type" => key::type_cmd(db, &invocation),
        "expire" => key::expire(db, &invocation),
        "ttl" => key::ttl(db, &invocation),
        "persist" => key::persist(db, &invocation),
        "rpush" => list::push(db, &invocation, false, false),
        "lpush" => list::push(db, &invocation, true, false),
        "rpushx" => list::push(db, &invocation, false, true),
        "lpushx" => list::push(db, &invocation, true, true),
        "linsert" => list::linsert(db, &invocation),
        "rpop" => list::pop(db, &invocation, false),
        "lpop" => list::pop(db, &invocation, true),
        "llen" => list::llen(db, &invocation),
        "lindex" => list::lindex(db, &invocation),
        "lset" => list::lset(db, &invocation),
        "lrange" => list::lrange(db, &invocation),
        "ltrim" => list::ltrim(db, &invocation),
        "lrem" => list::lrem(db, &invocation),
        "sadd" => set::sadd(db, &invocation),
        "srem" => set::srem(db, &invocation),
        "smove" => set::smove(db, &invocation),
        "sismember" => set::sismember(db, &invocation),
        "scard" => set::scard(db, &invocation),
        "spop" => set::spop(db, &invocation),
        "sinter" => set::sinter(db, &invocation),
        "sinterstore" => set::sinterstore(db, &invocation),
        "smembers" => set::smembers(db, &invocation),
        "zadd" => sorted_set::zadd(db, &invocation),
        "zincrby" => sorted_set::zincrby(db, &invocation),
        "zrem" => sorted_set::zrem(db, &invocation),
        "zremrangebyscore" => sorted_set::zremrangebyscore(db, &invocation),
        "zremrangebyrank" => sorted_set::zremrangebyrank(db, &invocation),
        "zrange" => sorted_set::zrange(db, &invocation, false, false),
        "zrevrange" => sorted_set::zrange(db, &invocation, true, false),
        "zrangewithscore" => sorted_set::zrange(db, &invocation, false, true),
        "zrevrangewithscore" => sorted_set::zrange(db, &invocation, true, true),
        "zrangebyscore" => sorted_set::zrangebyscore(db, &invocation, false),
        "zrevrangebyscore" => sorted_set::zrangebyscore(db, &invocation, true),
        "zcount" => sorted_set::zcount(db, &invocation),
        "zcard" => sorted_set::zcard(db, &invocation),
        "zscore" => sorted_set::zscore(db, &invocation),
        "zrank" => sorted_set::zrank(db, &invocation, false),
        "zrevrank" => sorted_set::zrank(db, &invocation, true),
        "hset" => hash::hset(db, &invocation),
        "hsetnx" => hash::hsetnx(db, &invocation),
        "hget" => hash::hget(db, &invocation),
        "hmset" => hash::hmset(db, &invocation),
        "hmget" => hash::hmget(db, &invocation),
        "hincrby" => hash::hincrby(db, &invocation),
        "hdel" => hash::hdel(db, &invocation),
        "hlen" => hash::hlen(db, &invocation),
        "hkeys" => hash::hkeys(db, &invocation),
        "hvals" => hash::hvals(db, &invocation),
        "hgetall" => hash::hgetall(db, &invocation),
        "hexists" => hash::hexists(db, &invocation),
        _ => unreachable!("command {} is in the catalogue without a handler", name),
    };

    outcome_or_error(result)
}

#[cfg(test)]
/// Shared test helpers for command-module unit tests.
pub mod test {
    use super::*;
    use crate::config::EngineConfig;

    /// Builds a fresh server with default config for use in tests.
    pub fn new_server() -> Server {
        // ignore the error from a second call; every test module shares
        // this helper and env_logger only allows a process-wide init once.
        let _ = env_logger::try_init();
        Server::new(EngineConfig::default())
    }

    /// Runs a command against `server` with the given string arguments.
    pub fn run(server: &mut Server, args: &[&str]) -> CommandOutcome {
        let argv: Vec<Bytes> = args.iter().map(|s| Bytes::from(s.to_string())).collect();
        execute(server, 0, &argv, 0, false, -1, 0)
    }

    #[test]
    fn unknown_command_is_a_syntax_error() {
        let mut server = new_server();
        let outcome = run(&mut server, &["bogus", "a"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrSyntaxError);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let mut server = new_server();
        let outcome = run(&mut server, &["get"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrWrongNumberArguments);
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut server = new_server();
        assert_eq!(run(&mut server, &["set", "foo", "bar"]).return_code(), ReturnCode::Ok);
        let outcome = run(&mut server, &["get", "foo"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Bytes(Bytes::from_static(b"bar"))));
    }

    #[test]
    fn scenario_s1_set_get_type() {
        let mut server = new_server();
        assert_eq!(run(&mut server, &["set", "foo", "bar"]).return_code(), ReturnCode::Ok);
        let outcome = run(&mut server, &["get", "foo"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Bytes(Bytes::from_static(b"bar"))));
        let outcome = run(&mut server, &["type", "foo"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Bytes(Bytes::from_static(b"string"))));
    }

    #[test]
    fn scenario_s2_list_push_range_pop_len() {
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
        assert_eq!(run(&mut server, &["llen", "L"]).scalar, Some(ReturnItem::Integer(1)));
    }

    #[test]
    fn scenario_s3_hash_incrby_bad_delta() {
        let mut server = new_server();
        run(&mut server, &["hset", "H", "f", "1"]);
        let outcome = run(&mut server, &["hincrby", "H", "f", "10"]);
        assert_eq!(outcome.scalar, Some(ReturnItem::Integer(11)));
        assert_eq!(
            run(&mut server, &["hget", "H", "f"]).scalar,
            Some(ReturnItem::Bytes(Bytes::from_static(b"11")))
        );
        let outcome = run(&mut server, &["hincrby", "H", "f", "x"]);
        assert_eq!(outcome.return_code(), ReturnCode::ErrIsNotInteger);
    }

    /// S4 / property 7: a stale `version_in` is rejected without mutating
    /// state; the correct one advances the version by exactly one.
    #[test]
    fn scenario_s4_version_discipline() {
        let mut server = new_server();
        let argv = |args: &[&str]| -> Vec<Bytes> { args.iter().map(|s| Bytes::from(s.to_string())).collect() };

        assert_eq!(
            execute(&mut server, 0, &argv(&["set", "k", "v"]), 0, true, -1, 0).return_code(),
            ReturnCode::Ok
        );

        let stale = execute(&mut server, 0, &argv(&["set", "k", "v2"]), 999, true, -1, 0);
        assert_eq!(stale.return_code(), ReturnCode::ErrVersionError);
        assert_eq!(
            execute(&mut server, 0, &argv(&["get", "k"]), 0, false, -1, 0).scalar,
            Some(ReturnItem::Bytes(Bytes::from_static(b"v")))
        );

        let ok = execute(&mut server, 0, &argv(&["set", "k", "v2"]), 1, true, -1, 0);
        assert_eq!(ok.return_code(), ReturnCode::Ok);
    }

    #[test]
    fn scenario_s5_expire_then_lapse() {
        let mut server = new_server();
        run(&mut server, &["set", "k", "v"]);
        assert_eq!(run(&mut server, &["expire", "k", "0"]).return_code(), ReturnCode::OkNotExist);
        assert_eq!(run(&mut server, &["expire", "k", "-1"]).return_code(), ReturnCode::Ok);
        assert_eq!(run(&mut server, &["expire", "k", "2"]).return_code(), ReturnCode::Ok);

        let argv: Vec<Bytes> = ["get", "k"].iter().map(|s| Bytes::from(s.to_string())).collect();
        let outcome = execute(&mut server, 0, &argv, 0, false, -1, 3);
        assert_eq!(outcome.return_code(), ReturnCode::OkNotExist);
    }

    /// S6 / property 9: per-DB eviction keeps usage under the cap as long
    /// as a sampling pass still makes progress.
    #[test]
    fn scenario_s6_per_db_eviction_bounds_size() {
        let mut server = Server::new(EngineConfig { db_max_memory: 100, ..EngineConfig::default() });
        for n in 0..1000 {
            run(&mut server, &["set", &format!("k{n}"), &format!("v{n}")]);
        }
        let db = server.database(0).unwrap();
        assert!(db.len() <= 100);
        assert!(db.evicted > 0);
    }
}
