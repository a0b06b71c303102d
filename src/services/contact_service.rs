use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::{
    db::{
        dao::{DaoLayerError, PageRequest, PaginatedResponse},
        entities::contact,
        store::{ContactPatch, ContactSearch, ContactStore, NewContact},
    },
    error::AppError,
};

pub const DEFAULT_BIRTHDAY_WINDOW_DAYS: i64 = 7;
pub const MAX_BIRTHDAY_WINDOW_DAYS: i64 = 365;

/// Anniversary of `birthday` on or after `today`. Feb 29 falls on Feb 28 in common years.
pub fn next_birthday(birthday: NaiveDate, today: NaiveDate) -> NaiveDate {
    let this_year = anniversary_in(birthday, today.year());
    if this_year >= today {
        this_year
    } else {
        anniversary_in(birthday, today.year() + 1)
    }
}

fn anniversary_in(birthday: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
        .unwrap_or(birthday)
}

fn contact_error(err: DaoLayerError) -> AppError {
    match err {
        DaoLayerError::NotFound { .. } => AppError::not_found("Contact not found"),
        DaoLayerError::Conflict { .. } => {
            AppError::conflict("Contact with this email already exists")
        }
        other => other.into(),
    }
}

#[derive(Clone, Copy)]
pub struct ContactService<'a> {
    contacts: &'a dyn ContactStore,
}

impl<'a> ContactService<'a> {
    pub fn new(contacts: &'a dyn ContactStore) -> Self {
        Self { contacts }
    }

    pub async fn create(&self, new_contact: NewContact) -> Result<contact::Model, AppError> {
        if self
            .contacts
            .find_by_email_for_owner(new_contact.user_id, &new_contact.email)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Contact with this email already exists"));
        }

        self.contacts
            .create(new_contact)
            .await
            .map_err(contact_error)
    }

    pub async fn list(
        &self,
        owner: Uuid,
        page: PageRequest,
    ) -> Result<PaginatedResponse<contact::Model>, AppError> {
        Ok(self.contacts.list_for_owner(owner, page).await?)
    }

    pub async fn list_all(
        &self,
        page: PageRequest,
    ) -> Result<PaginatedResponse<contact::Model>, AppError> {
        Ok(self.contacts.list_all(page).await?)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<contact::Model, AppError> {
        self.contacts
            .find_for_owner(owner, id)
            .await?
            .ok_or_else(|| AppError::not_found("Contact not found"))
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> Result<contact::Model, AppError> {
        if let Some(email) = patch.email.as_deref() {
            let clash = self.contacts.find_by_email_for_owner(owner, email).await?;
            if clash.is_some_and(|existing| existing.id != id) {
                return Err(AppError::conflict("Contact with this email already exists"));
            }
        }

        self.contacts
            .update_for_owner(owner, id, patch)
            .await
            .map_err(contact_error)
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<contact::Model, AppError> {
        self.contacts
            .delete_for_owner(owner, id)
            .await
            .map_err(contact_error)
    }

    pub async fn search(
        &self,
        owner: Uuid,
        query: &ContactSearch,
    ) -> Result<Vec<contact::Model>, AppError> {
        if query.is_empty() {
            return Err(AppError::bad_request(
                "Provide at least one of first_name, last_name or email",
            ));
        }

        let found = self.contacts.search_for_owner(owner, query).await?;
        if found.is_empty() {
            return Err(AppError::not_found("No contacts found"));
        }
        Ok(found)
    }

    /// Contacts whose next birthday lies in `[today, today + days]`, soonest first.
    pub async fn upcoming_birthdays(
        &self,
        owner: Uuid,
        days: i64,
        today: NaiveDate,
    ) -> Result<Vec<contact::Model>, AppError> {
        if !(1..=MAX_BIRTHDAY_WINDOW_DAYS).contains(&days) {
            return Err(AppError::bad_request(format!(
                "days must be between 1 and {MAX_BIRTHDAY_WINDOW_DAYS}"
            )));
        }

        let mut upcoming: Vec<(i64, contact::Model)> = self
            .contacts
            .all_for_owner(owner)
            .await?
            .into_iter()
            .filter_map(|contact| {
                let until = (next_birthday(contact.birthday, today) - today).num_days();
                (until <= days).then_some((until, contact))
            })
            .collect();

        upcoming.sort_by(|(a_days, a), (b_days, b)| {
            a_days
                .cmp(b_days)
                .then_with(|| a.last_name.cmp(&b.last_name))
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(upcoming.into_iter().map(|(_, contact)| contact).collect())
    }
}
