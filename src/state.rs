use std::sync::Arc;

use crate::{
    auth::TokenService,
    config::AppConfig,
    db::Stores,
    services::{avatar::AvatarStorage, mail::MailQueue},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub stores: Stores,
    pub tokens: TokenService,
    pub mail: MailQueue,
    pub avatars: Arc<dyn AvatarStorage>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        stores: Stores,
        mail: MailQueue,
        avatars: Arc<dyn AvatarStorage>,
    ) -> Arc<Self> {
        let tokens = TokenService::new(&config.auth);
        Arc::new(Self {
            config,
            stores,
            tokens,
            mail,
            avatars,
        })
    }
}
