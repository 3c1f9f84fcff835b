// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-bridge — The method-call surface a host application talks to.
//
// Host platforms hand over a method name plus raw arguments; this crate
// validates them, runs the scan pipeline off the caller's thread, and maps
// every failure onto a stable channel error code.

pub mod error;
pub mod request;
pub mod service;

pub use error::ChannelError;
pub use request::{ArgValue, Method, MethodArgs, MethodCall, RequestId, ScanRequest};
pub use service::ScanService;
