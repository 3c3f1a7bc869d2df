// Copyright 2022 Ryan Seipp
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entry point: reads configuration, ignores `SIGPIPE` process-wide, installs a `SIGINT`
//! handler that clears the dispatcher's shutdown flag, binds the listening socket, and runs
//! the event loop until told to stop.

use std::process::ExitCode;
use std::sync::atomic::Ordering;

use maestro::{Config, Dispatcher};

fn main() -> ExitCode {
    let config = Config::from_env();

    // SIGPIPE ignored process-wide, per spec §5/§6: writes to a peer that already closed its
    // read side should surface as a normal `EPIPE`/`BrokenPipe` write error, not kill the
    // process.
    unsafe {
        if signal_hook::low_level::register(signal_hook::consts::SIGPIPE, || {}).is_err() {
            eprintln!("maestro: failed to install SIGPIPE handler, continuing anyway");
        }
    }

    let mut dispatcher = match Dispatcher::bind(config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("maestro: setup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = dispatcher.shutdown_flag();
    // SAFETY: the closure only stores to an `AtomicBool`, which is async-signal-safe.
    if let Err(e) = unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, move || {
            shutdown.store(false, Ordering::SeqCst);
        })
    } {
        eprintln!("maestro: failed to install SIGINT handler: {e}");
        return ExitCode::FAILURE;
    }

    match dispatcher.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("maestro: event loop failed: {e}");
            ExitCode::FAILURE
        }
    }
}
