use crate::{
    services::{
        auth_service::AuthService, contact_service::ContactService, user_service::UserService,
    },
    state::AppState,
};

#[derive(Clone, Copy)]
pub struct ServiceContext<'a> {
    state: &'a AppState,
}

impl<'a> ServiceContext<'a> {
    pub fn from_state(state: &'a AppState) -> Self {
        Self { state }
    }

    pub fn auth(&self) -> AuthService<'a> {
        AuthService::new(
            self.state.stores.users.as_ref(),
            &self.state.tokens,
            &self.state.mail,
            self.state.avatars.as_ref(),
            &self.state.config.general.public_url,
        )
    }

    pub fn contacts(&self) -> ContactService<'a> {
        ContactService::new(self.state.stores.contacts.as_ref())
    }

    pub fn users(&self) -> UserService<'a> {
        UserService::new(self.state.stores.users.as_ref())
    }
}
