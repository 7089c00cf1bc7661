//! Command table and handlers. Grounded on the tutorial's `do_get`/`do_set`/
//! `do_del`/`do_expire`/`do_ttl`/`do_keys`/`do_zadd`/`do_zrem`/`do_zscore`/
//! `do_zquery` (`section13/server.cpp`). Error messages are carried over
//! verbatim from the tutorial source where it names one, since the spec
//! leaves exact wording unconstrained and reusing it costs nothing.

use rkv_common::wire::{begin_arr, end_arr, out_dbl, out_err, out_int, out_nil, out_str};
use rkv_common::ErrCode;

use crate::keyspace::Keyspace;

pub fn execute(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    if args.is_empty() {
        out_err(out, ErrCode::Unknown, "empty command");
        return;
    }
    let cmd = args[0].to_ascii_lowercase();
    match (cmd.as_slice(), args.len()) {
        (b"keys", 1) => do_keys(keyspace, out),
        (b"get", 2) => do_get(args, keyspace, out),
        (b"set", 3) => do_set(args, keyspace, out),
        (b"del", 2) => do_del(args, keyspace, out),
        (b"pexpire", 3) => do_pexpire(args, keyspace, out),
        (b"pttl", 2) => do_pttl(args, keyspace, out),
        (b"zadd", 4) => do_zadd(args, keyspace, out),
        (b"zrem", 3) => do_zrem(args, keyspace, out),
        (b"zscore", 3) => do_zscore(args, keyspace, out),
        (b"zquery", 6) => do_zquery(args, keyspace, out),
        _ => out_err(out, ErrCode::Unknown, "unknown command"),
    }
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

fn parse_f64(bytes: &[u8]) -> Option<f64> {
    let v: f64 = std::str::from_utf8(bytes).ok()?.trim().parse().ok()?;
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

fn do_keys(keyspace: &Keyspace, out: &mut Vec<u8>) {
    let pos = begin_arr(out);
    let mut n: u32 = 0;
    keyspace.scan_keys(|k| {
        out_str(out, k);
        n += 1;
    });
    end_arr(out, pos, n);
}

fn do_get(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    match keyspace.get_str(&args[1]) {
        Ok(Some(v)) => out_str(out, v),
        Ok(None) => out_nil(out),
        Err(code) => out_err(out, code, "expect string type"),
    }
}

fn do_set(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    match keyspace.set_str(&args[1], args[2].clone()) {
        Ok(()) => out_nil(out),
        Err(code) => out_err(out, code, "expect string type"),
    }
}

fn do_del(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    out_int(out, keyspace.del(&args[1]) as i64);
}

fn do_pexpire(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    let Some(ms) = parse_i64(&args[2]) else {
        return out_err(out, ErrCode::Arg, "expect int64");
    };
    out_int(out, keyspace.pexpire(&args[1], ms) as i64);
}

fn do_pttl(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    out_int(out, keyspace.pttl(&args[1]));
}

fn do_zadd(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    let Some(score) = parse_f64(&args[2]) else {
        return out_err(out, ErrCode::Arg, "expect fp number");
    };
    match keyspace.zadd(&args[1], score, &args[3]) {
        Ok(added) => out_int(out, added as i64),
        Err(code) => out_err(out, code, "expect zset"),
    }
}

fn do_zrem(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    match keyspace.zrem(&args[1], &args[2]) {
        Ok(Some(removed)) => out_int(out, removed as i64),
        Ok(None) => out_nil(out),
        Err(code) => out_err(out, code, "expect zset"),
    }
}

fn do_zscore(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    match keyspace.zscore(&args[1], &args[2]) {
        Ok(Some(score)) => out_dbl(out, score),
        Ok(None) => out_nil(out),
        Err(code) => out_err(out, code, "expect zset"),
    }
}

fn do_zquery(args: &[Vec<u8>], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    let Some(score) = parse_f64(&args[2]) else {
        return out_err(out, ErrCode::Arg, "expect fp number");
    };
    let Some(offset) = parse_i64(&args[4]) else {
        return out_err(out, ErrCode::Arg, "expect int");
    };
    let Some(limit) = parse_i64(&args[5]) else {
        return out_err(out, ErrCode::Arg, "expect int");
    };
    match keyspace.zquery(&args[1], score, &args[3], offset, limit) {
        Ok(pairs) => {
            let pos = begin_arr(out);
            let mut n: u32 = 0;
            for (name, member_score) in pairs {
                out_str(out, &name);
                out_dbl(out, member_score);
                n += 2;
            }
            end_arr(out, pos, n);
        }
        Err(code) => out_err(out, code, "expect zset"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rkv_common::wire::{self, TAG_ARR, TAG_ERR, TAG_INT, TAG_NIL, TAG_STR};

    fn run(keyspace: &mut Keyspace, args: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        let owned: Vec<Vec<u8>> = args.iter().map(|a| a.to_vec()).collect();
        execute(&owned, keyspace, &mut out);
        out
    }

    #[test]
    fn set_get_del_end_to_end() {
        let mut ks = Keyspace::new();
        assert_eq!(run(&mut ks, &[b"set", b"foo", b"bar"])[0], TAG_NIL);
        let out = run(&mut ks, &[b"get", b"foo"]);
        assert_eq!(out[0], TAG_STR);
        assert_eq!(&out[5..8], b"bar");
        let out = run(&mut ks, &[b"del", b"foo"]);
        assert_eq!(out[0], TAG_INT);
        assert_eq!(i64::from_le_bytes(out[1..9].try_into().unwrap()), 1);
        assert_eq!(run(&mut ks, &[b"get", b"foo"]), vec![TAG_NIL]);
    }

    #[test]
    fn get_missing_is_nil() {
        let mut ks = Keyspace::new();
        let out = run(&mut ks, &[b"get", b"missing"]);
        assert_eq!(out, vec![TAG_NIL]);
    }

    #[test]
    fn zadd_on_string_key_is_type_error() {
        let mut ks = Keyspace::new();
        run(&mut ks, &[b"set", b"k", b"v"]);
        let out = run(&mut ks, &[b"zadd", b"k", b"1", b"a"]);
        assert_eq!(out[0], TAG_ERR);
        let code = i32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(code, ErrCode::Type.code());
    }

    #[test]
    fn zquery_end_to_end_matches_scenario() {
        let mut ks = Keyspace::new();
        assert_eq!(run(&mut ks, &[b"zadd", b"z", b"1.5", b"alice"])[0], TAG_INT);
        run(&mut ks, &[b"zadd", b"z", b"2.0", b"bob"]);
        let out = run(&mut ks, &[b"zquery", b"z", b"0", b"", b"0", b"10"]);
        assert_eq!(out[0], TAG_ARR);
        let nelem = u32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(nelem, 4); // 2 pairs, counted as 4 elements
    }

    #[test]
    fn zquery_missing_key_is_empty_array() {
        let mut ks = Keyspace::new();
        let out = run(&mut ks, &[b"zquery", b"nope", b"0", b"", b"0", b"10"]);
        assert_eq!(out[0], TAG_ARR);
        let nelem = u32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(nelem, 0);
    }

    #[test]
    fn zadd_rejects_nan_score_as_arg_error() {
        let mut ks = Keyspace::new();
        let out = run(&mut ks, &[b"zadd", b"z", b"nan", b"a"]);
        assert_eq!(out[0], TAG_ERR);
        let code = i32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(code, ErrCode::Arg.code());
    }

    #[test]
    fn wrong_arity_is_err_unknown() {
        let mut ks = Keyspace::new();
        let out = run(&mut ks, &[b"set", b"onlyonearg"]);
        assert_eq!(out[0], TAG_ERR);
        let code = i32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(code, ErrCode::Unknown.code());
    }

    #[test]
    fn unknown_command_is_err_unknown() {
        let mut ks = Keyspace::new();
        let out = run(&mut ks, &[b"frobnicate", b"x"]);
        assert_eq!(out[0], TAG_ERR);
        let code = i32::from_le_bytes(out[1..5].try_into().unwrap());
        assert_eq!(code, ErrCode::Unknown.code());
    }

    #[test]
    fn full_response_frame_round_trips_through_wire_helpers() {
        let mut ks = Keyspace::new();
        let mut frame = Vec::new();
        let pos = wire::response_begin(&mut frame);
        execute(&[b"set".to_vec(), b"k".to_vec(), b"v".to_vec()], &mut ks, &mut frame);
        wire::response_end(&mut frame, pos);
        let total_len = u32::from_le_bytes(frame[0..4].try_into().unwrap());
        assert_eq!(total_len as usize, frame.len() - 4);
    }
}
