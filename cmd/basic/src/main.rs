//! Basic costack example
//!
//! Demonstrates spawning routines and cooperative interleaving on a single
//! shared stack.
//!
//! # Environment Variables
//!
//! - `CO_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `CO_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug)

use costack::{kdebug, kinfo, Engine, EngineConfig};
use std::cell::Cell;
use std::rc::Rc;
// CO_LOG_LEVEL=debug CO_FLUSH_EPRINT=1 cargo run -p costack-basic
fn main() {
    println!("=== costack Basic Example ===\n");

    let config = EngineConfig::from_env().max_routines(16);
    let engine = Rc::new(Engine::new(config));

    let completed = Rc::new(Cell::new(0usize));

    let e = engine.clone();
    let c = completed.clone();
    engine
        .start(
            || {},
            move || {
                kinfo!("Spawning routines...");

                for i in 1..=3 {
                    let e2 = e.clone();
                    let c2 = c.clone();
                    let id = e
                        .spawn(move || {
                            kdebug!("[routine {}] Started", i);

                            for j in 0..3 {
                                kdebug!("[routine {}] Iteration {}", i, j);
                                e2.yield_now();
                            }

                            kdebug!("[routine {}] Finished", i);
                            c2.set(c2.get() + 1);
                        })
                        .unwrap();
                    println!("Spawned routine {} (ID={})", i, id);
                }

                // let the spawned routines run to completion
                while c.get() < 3 {
                    e.yield_now();
                }

                kinfo!("{} routine(s) completed", c.get());
            },
        )
        .expect("engine failed");

    println!("\n=== Example Complete ===");
}
