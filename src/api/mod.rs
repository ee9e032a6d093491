pub mod v1;

use actix_web::web;

/// Mounts every handler under `/cashflow_test/v1` (§6), matching the
/// original's `server.SetupRouter` base path.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/cashflow_test/v1").configure(v1::configure));
}
