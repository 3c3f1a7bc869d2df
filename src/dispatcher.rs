//! The single-threaded acceptor/dispatcher loop: binds the listening socket, waits on the
//! readiness monitor, expires idle connections, accepts new ones, and submits ready connections'
//! HTTP tasks to the worker pool.
//!
//! Grounded in the teacher's root `src/listener.rs` (`Listener::run`'s wait/accept/dispatch tick,
//! `LISTEN_TOKEN` reservation, slab-of-connections ownership) and in
//! `examples/original_source/maestro.c`'s event loop, generalized from `epoll_wait` to
//! [`crate::poll::ReadinessMonitor`] and from a raw timer list to [`crate::timer::TimerRegistry`].

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Token};
use slab::Slab;

use crate::config::Config;
use crate::connection::{Connection, TaskOutcome};
use crate::pool::WorkerPool;
use crate::poll::{self, ReadinessMonitor, RegistryHandle};
use crate::timer::TimerRegistry;

/// Reserved token for the listening socket; client tokens are slab keys, which start at 0 and
/// never reach this.
const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Maximum readiness events handled per tick, per spec §3's bounded ready-event batch.
const MAX_EVENTS: usize = 2048;

type SharedConnection = Arc<Mutex<Connection<TcpStream>>>;
type Connections = Arc<Mutex<Slab<SharedConnection>>>;

/// Milliseconds since the Unix epoch. Only differences between calls are ever compared, per
/// spec §6.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Owns the listening socket, the readiness monitor, the timer registry, and the worker pool,
/// and drives the single-threaded event loop described in spec §4.5.
pub struct Dispatcher {
    listener: TcpListener,
    monitor: ReadinessMonitor,
    registry: RegistryHandle,
    timers: Arc<Mutex<TimerRegistry>>,
    connections: Connections,
    pool: Option<WorkerPool>,
    document_root: Arc<std::path::PathBuf>,
    keepalive_ms: u64,
    running: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Binds the listening socket on `config.port` (`INADDR_ANY`, `SO_REUSEADDR` is `mio`'s
    /// default for a freshly bound listener) and registers it with the monitor.
    pub fn bind(config: Config) -> std::io::Result<Self> {
        let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
        let mut listener = TcpListener::bind(addr)?;

        let monitor = ReadinessMonitor::new()?;
        let registry = monitor.handle()?;
        monitor_add_listener(&monitor, &mut listener)?;

        let pool_size = WorkerPool::size_for_available_parallelism(config.threads_per_core);

        Ok(Dispatcher {
            listener,
            monitor,
            registry,
            timers: Arc::new(Mutex::new(TimerRegistry::new())),
            connections: Arc::new(Mutex::new(Slab::new())),
            pool: Some(WorkerPool::new(pool_size)),
            document_root: Arc::new(config.document_root),
            keepalive_ms: config.keepalive_ms,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// A clone of the shutdown flag; setting it false causes [`Self::run`] to exit at the top of
    /// its next iteration, per spec §4.5's termination rule.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Runs the event loop until [`Self::shutdown_flag`] is cleared. On return, the pool has been
    /// drained and destroyed and the listening socket deregistered.
    pub fn run(&mut self) -> std::io::Result<()> {
        let mut events = Events::with_capacity(MAX_EVENTS);

        while self.running.load(Ordering::SeqCst) {
            self.monitor
                .wait(&mut events, Some(Duration::from_millis(self.keepalive_ms)))?;

            let now = now_ms();
            self.expire_idle_connections(now);

            for event in poll::decode(&events, MAX_EVENTS) {
                if event.token == LISTENER_TOKEN {
                    self.accept_all(now)?;
                    continue;
                }

                if event.is_peer_error() {
                    // Folded into the single close+remove path the timer sweep already owns,
                    // per spec §4.5 step 3 and §7's peer-error handling.
                    self.timers.lock().unwrap().update(event.token, now);
                    continue;
                }

                self.dispatch(event.token);
            }
        }

        self.shutdown();
        Ok(())
    }

    fn expire_idle_connections(&self, now: u64) {
        let expired: Vec<Token> = {
            let mut timers = self.timers.lock().unwrap();
            let mut tokens = Vec::new();
            timers.expire(now, self.keepalive_ms, |token| tokens.push(token));
            tokens
        };

        for token in expired {
            self.close(token);
        }
    }

    fn close(&self, token: Token) {
        let removed = self.connections.lock().unwrap().try_remove(token.0);
        if let Some(conn) = removed {
            let _ = conn.lock().unwrap().deregister(&self.registry);
        }
    }

    fn accept_all(&self, now: u64) -> std::io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => self.adopt(stream, now)?,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return Ok(()),
            }
        }
    }

    fn adopt(&self, stream: TcpStream, now: u64) -> std::io::Result<()> {
        let mut connections = self.connections.lock().unwrap();
        let entry = connections.vacant_entry();
        let token = Token(entry.key());

        let mut conn = Connection::new(token, stream);
        conn.register(&self.registry)?;
        entry.insert(Arc::new(Mutex::new(conn)));
        drop(connections);

        // A duplicate here would mean the slab handed out a key already tracked by the timer
        // registry, which would itself be a bug in the slab; nothing sane to do but drop it.
        let _ = self.timers.lock().unwrap().append(token, now);
        Ok(())
    }

    fn dispatch(&self, token: Token) {
        let Some(conn) = self.connections.lock().unwrap().get(token.0).cloned() else {
            return;
        };

        // Enforce one-shot for real: pull the descriptor out of the monitor before the task is
        // even submitted, so a second edge on the same socket while this task is still queued or
        // running produces no event at all, rather than a second task racing the first for the
        // same slab key. If this token was already pulled (a second event for it reached this
        // tick, which can happen once per edge before the removal above takes effect), there's
        // nothing more to deregister and no task to submit — the first dispatch owns it.
        if conn.lock().unwrap().deregister(&self.registry).is_err() {
            return;
        }

        let registry = self.registry.clone();
        let timers = Arc::clone(&self.timers);
        let connections = Arc::clone(&self.connections);
        let document_root = Arc::clone(&self.document_root);

        self.pool.as_ref().expect("pool is only taken during shutdown").submit(move || {
            let outcome = {
                let mut conn = conn.lock().unwrap();
                conn.task(&document_root)
            };

            match outcome {
                Ok(TaskOutcome::Rearmed) => {
                    let mut guard = conn.lock().unwrap();
                    if guard.rearm(&registry).is_ok() {
                        drop(guard);
                        timers.lock().unwrap().update(token, now_ms());
                    } else {
                        drop(guard);
                        close_connection(&connections, &registry, token);
                    }
                }
                Ok(TaskOutcome::Closed) | Err(_) => {
                    close_connection(&connections, &registry, token);
                }
            }
        });
    }

    fn shutdown(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.wait_idle();
            pool.destroy();
        }

        let mut connections = self.connections.lock().unwrap();
        for (_, conn) in connections.iter() {
            let _ = conn.lock().unwrap().deregister(&self.registry);
        }
        connections.clear();

        let _ = self.registry.remove(&mut self.listener);
    }
}

fn close_connection(connections: &Connections, registry: &RegistryHandle, token: Token) {
    let removed = connections.lock().unwrap().try_remove(token.0);
    if let Some(conn) = removed {
        let _ = conn.lock().unwrap().deregister(registry);
    }
}

fn monitor_add_listener(monitor: &ReadinessMonitor, listener: &mut TcpListener) -> std::io::Result<()> {
    monitor.add(listener, LISTENER_TOKEN)
}
