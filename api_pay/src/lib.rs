use actix_web::web;

pub mod routes {
    pub mod pay;
}

mod services {
    pub(crate) mod checkout;
    pub(crate) mod refund;
    pub(crate) mod webhook;
}

mod dtos {
    pub(crate) mod pay;
}

pub fn mount_pay() -> actix_web::Scope {
    web::scope("/payments")
        .service(routes::pay::post_checkout_session)
        .service(routes::pay::post_webhook)
        .service(routes::pay::get_verify)
        .service(routes::pay::get_my_payments)
        .service(routes::pay::post_refund)
}
