//! Single-threaded non-blocking reactor. Grounded on the tutorial's `main()`
//! poll loop and `next_timer_ms`/`process_timers` (`section13/server.cpp`),
//! rebuilt on `mio` instead of raw `poll(2)` (see `SPEC_FULL.md` §2's
//! reactor-substrate amendment). `mio::Token` maps 1:1 onto `ConnTable`
//! slab indices, the Rust analogue of the tutorial's `fd2conn` array.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use rkv_common::limits::{IDLE_TIMEOUT_MS, MAX_TTL_REAP_PER_TICK, POLL_CEILING_MS, TIMER_FUDGE_MS};
use rkv_common::Config;

use crate::clock::now_us;
use crate::conn::{Conn, ConnTable};
use crate::idle::IdleList;
use crate::keyspace::Keyspace;

const LISTENER_TOKEN: Token = Token(usize::MAX);

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    conns: ConnTable,
    idle: IdleList,
    keyspace: Keyspace,
    events: Events,
}

impl Reactor {
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("bad bind address: {e}")))?;

        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        tracing::info!(%addr, "listening");

        Ok(Reactor {
            poll,
            listener,
            conns: ConnTable::new(),
            idle: IdleList::new(),
            keyspace: Keyspace::new(),
            events: Events::with_capacity(1024),
        })
    }

    /// Runs the reactor loop forever. Only returns on a multiplexer error,
    /// which is fatal to the process (see `SPEC_FULL.md` §7).
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.poll_once()?;
        }
    }

    fn poll_once(&mut self) -> io::Result<()> {
        let timeout = self.next_timeout();
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        let ready: Vec<Token> = self.events.iter().map(|e| e.token()).collect();
        for token in ready {
            if token != LISTENER_TOKEN {
                self.dispatch_conn(token.0);
            }
        }

        self.reap_closed_conns();
        self.process_timers();
        self.accept_new_conns();
        Ok(())
    }

    fn dispatch_conn(&mut self, idx: usize) {
        let now = now_us();
        {
            let Some(conn) = self.conns.get_mut(idx) else { return };
            conn.connection_io(now, &mut self.keyspace);
        }

        let done = self.conns.get(idx).map(|c| c.is_done()).unwrap_or(true);
        if done {
            return;
        }

        self.idle.touch(&mut self.conns, idx);

        let conn = self.conns.get_mut(idx).expect("checked live above");
        let interest = if conn.wants_write() { Interest::WRITABLE } else { Interest::READABLE };
        if let Err(e) = self.poll.registry().reregister(&mut conn.stream, Token(idx), interest) {
            tracing::warn!(idx, %e, "failed to reregister connection interest");
        }
    }

    fn reap_closed_conns(&mut self) {
        let done: Vec<usize> = self
            .conns
            .live_indices()
            .filter(|&i| self.conns.get(i).expect("live index").is_done())
            .collect();
        for idx in done {
            self.idle.unlink(&mut self.conns, idx);
            if let Some(mut conn) = self.conns.remove(idx) {
                let _ = self.poll.registry().deregister(&mut conn.stream);
            }
        }
    }

    /// Reaps idle-timed-out connections and TTL-expired keys in one pass,
    /// mirroring `process_timers`'s combined sweep.
    fn process_timers(&mut self) {
        let now = now_us() + (TIMER_FUDGE_MS as u64) * 1000;
        let idle_timeout_us = (IDLE_TIMEOUT_MS as u64) * 1000;

        while let Some(idx) = self.idle.front() {
            let idle_start = self.conns.get(idx).expect("idle list node is live").idle_start;
            if now.saturating_sub(idle_start) < idle_timeout_us {
                break;
            }
            self.idle.unlink(&mut self.conns, idx);
            if let Some(mut conn) = self.conns.remove(idx) {
                tracing::debug!(idx, "evicting idle connection");
                let _ = self.poll.registry().deregister(&mut conn.stream);
            }
        }

        let reaped = self.keyspace.reap_expired(now, MAX_TTL_REAP_PER_TICK);
        if reaped > 0 {
            tracing::debug!(reaped, "reaped ttl-expired keys");
        }
    }

    fn accept_new_conns(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let now = now_us();
                    let idx = self.conns.insert(Conn::new(stream, now));
                    let conn = self.conns.get_mut(idx).expect("just inserted");
                    match self.poll.registry().register(&mut conn.stream, Token(idx), Interest::READABLE) {
                        Ok(()) => {
                            self.idle.link_back(&mut self.conns, idx);
                            tracing::debug!(idx, %peer, "accepted connection");
                        }
                        Err(e) => {
                            tracing::warn!(%e, "failed to register accepted connection");
                            self.conns.remove(idx);
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(%e, "accept failed");
                    break;
                }
            }
        }
    }

    /// The minimum of the idle list head's deadline, the TTL heap root's
    /// deadline, and the poll ceiling, plus a 1ms fudge factor — see
    /// `SPEC_FULL.md` §5's timer-fudge amendment.
    fn next_timeout(&self) -> Duration {
        let now = now_us();
        let ceiling_deadline = now + (POLL_CEILING_MS as u64) * 1000;
        let mut next_us = ceiling_deadline;

        if let Some(idx) = self.idle.front() {
            let idle_start = self.conns.get(idx).expect("idle list node is live").idle_start;
            next_us = next_us.min(idle_start + (IDLE_TIMEOUT_MS as u64) * 1000);
        }
        if let Some(deadline) = self.keyspace.next_ttl_deadline_us() {
            next_us = next_us.min(deadline);
        }

        let next_us = next_us + (TIMER_FUDGE_MS as u64) * 1000;
        Duration::from_micros(next_us.saturating_sub(now))
    }
}
