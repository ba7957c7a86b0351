use std::collections::HashMap;

use stripe::{Client, CreateCustomer, Customer};
use uuid::Uuid;

use crate::error::{AppError, Res};

pub fn create_client(secret_key: &str) -> Client {
    Client::new(secret_key)
}

/// Creates a Stripe customer tagged with the local user id.
pub async fn create_customer(
    client: &Client,
    email: &str,
    name: &str,
    user_id: Uuid,
) -> Res<Customer> {
    let params = CreateCustomer {
        email: Some(email),
        name: Some(name),
        metadata: Some(HashMap::from([(
            "userId".to_string(),
            user_id.to_string(),
        )])),
        ..Default::default()
    };

    Customer::create(client, params)
        .await
        .map_err(AppError::from)
}
