//! Provider data structure passed to resources

use crate::api::Client;

#[derive(Clone)]
pub struct SupabaseProviderData {
    pub client: Client,
}

impl SupabaseProviderData {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}
