pub mod account;
pub mod checkout;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/account")
            .route("/create-merchant", web::post().to(account::create_merchant))
            .route("/merchant", web::get().to(account::get_merchant)),
    )
    .service(
        web::scope("/checkout")
            .route("/create-intent", web::post().to(checkout::create_intent)),
    );
}
