//! FIRE (Financial Independence, Retire Early) calculations: FIRE number,
//! years to FIRE, net worth timelines, scenario sweeps, Coast FIRE, goal
//! solving and a small portfolio tracker, exposed through a CLI and a JSON
//! HTTP API.

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod portfolio;
