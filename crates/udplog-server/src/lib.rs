//! # udplog-server
//!
//! Network surface of udplog: a UDP listener feeding the intake engine, and
//! an HTTP server for querying and tailing the collected lines.
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/` | GET | Log viewer page |
//! | `/logs?limit=N` | GET | Most recent entries (1..=5000, default 500) |
//! | `/logs` | DELETE | Clear the in-memory buffer |
//! | `/ws?token=T` | GET | WebSocket live tail |
//! | `/health` | GET | Liveness and uptime |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod intake;
pub mod listener;
pub mod routes;
pub mod server;
pub mod state;
pub mod websocket;

pub use error::{ApiError, ServerError, ServerResult};
pub use intake::{IntakeReceiver, IntakeSender, intake_channel, spawn_intake_worker};
pub use listener::{AllowList, DatagramListener, RECV_BUFFER_SIZE, split_lines};
pub use routes::create_router;
pub use server::{LogServer, RunningServer};
pub use state::AppState;
pub use websocket::CLOSE_UNAUTHORIZED;
