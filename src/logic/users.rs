//! User requests, their handlers and validators.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::logic::mapping::{apply_command, map_command};
use crate::logic::pipeline::{Behaviors, Pipeline, Request, RequestContext, RequestHandler, Validator};
use crate::logic::results::ValidationOutcome;
use crate::model::{
    parse_identifier, AppError, AppResult, CreateUserResponse, DomainEvent, Entity, Id,
    ListResponse, Optional, User, UserCommand, UserResponse,
};
use crate::store::{PersistenceStore, QueryOptions, Repository};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub data: UserCommand,
}

impl Request for CreateUserRequest {
    type Response = CreateUserResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub id: Id,
    pub data: UserCommand,
}

impl Request for UpdateUserRequest {
    type Response = UserResponse;
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteUserRequest {
    pub id: Id,
}

impl Request for DeleteUserRequest {
    type Response = ();
}

#[derive(Debug, Clone, Serialize)]
pub struct GetUserRequest {
    pub id: Id,
    pub include: Option<String>,
}

impl Request for GetUserRequest {
    type Response = UserResponse;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListUsersRequest {
    /// Case-insensitive substring match on the user name
    pub user_name: Option<String>,
    pub include: Option<String>,
}

impl Request for ListUsersRequest {
    type Response = ListResponse<UserResponse>;
}

/// Hand released events to their consumers. Logging is the only consumer so far.
fn publish_events(ctx: &RequestContext, events: &[DomainEvent]) {
    for event in events {
        ctx.logger.debug(format_args!(
            "Domain event {:?} for {} {}",
            event.action, event.entity_type, event.entity_id
        ));
    }
}

async fn load_user<S: PersistenceStore>(
    repository: &Repository<S>,
    id: Id,
    include: Option<&str>,
) -> AppResult<User> {
    match repository.find_by_id::<User>(id, include).await? {
        Some(user) => Ok(user),
        None => Err(AppError::not_found(User::ENTITY_TYPE, id).into()),
    }
}

pub struct CreateUserHandler<S> {
    store: Arc<S>,
}

impl<S> CreateUserHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<S: PersistenceStore> RequestHandler<CreateUserRequest> for CreateUserHandler<S> {
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: CreateUserRequest,
    ) -> AppResult<CreateUserResponse> {
        ctx.logger.debug("Entering command handler CreateUserHandler");

        let mut user: User = map_command(&request.data)?;
        let mut repository = Repository::new(self.store.clone());
        repository.add(&mut user)?;
        let events = repository.commit().await?;
        publish_events(ctx, &events);

        let saved = load_user(&repository, user.id(), None).await?;
        Ok(CreateUserResponse {
            data: UserResponse::from(&saved),
        })
    }
}

pub struct UpdateUserHandler<S> {
    store: Arc<S>,
}

impl<S> UpdateUserHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<S: PersistenceStore> RequestHandler<UpdateUserRequest> for UpdateUserHandler<S> {
    async fn handle(&self, ctx: &RequestContext, request: UpdateUserRequest) -> AppResult<UserResponse> {
        ctx.logger.debug("Entering command handler UpdateUserHandler");

        let mut repository = Repository::new(self.store.clone());
        let current = load_user(&repository, request.id, None).await?;
        let mut updated = apply_command(&request.data, &current)?;
        repository.update(&mut updated)?;
        let events = repository.commit().await?;
        publish_events(ctx, &events);

        let saved = load_user(&repository, request.id, None).await?;
        Ok(UserResponse::from(&saved))
    }
}

pub struct DeleteUserHandler<S> {
    store: Arc<S>,
}

impl<S> DeleteUserHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<S: PersistenceStore> RequestHandler<DeleteUserRequest> for DeleteUserHandler<S> {
    async fn handle(&self, ctx: &RequestContext, request: DeleteUserRequest) -> AppResult<()> {
        let mut repository = Repository::new(self.store.clone());
        let user = load_user(&repository, request.id, None).await?;
        repository.delete(&user)?;
        let events = repository.commit().await?;
        publish_events(ctx, &events);
        Ok(())
    }
}

pub struct GetUserHandler<S> {
    store: Arc<S>,
}

impl<S> GetUserHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<S: PersistenceStore> RequestHandler<GetUserRequest> for GetUserHandler<S> {
    async fn handle(&self, _ctx: &RequestContext, request: GetUserRequest) -> AppResult<UserResponse> {
        let repository = Repository::new(self.store.clone());
        let user = load_user(&repository, request.id, request.include.as_deref()).await?;
        Ok(UserResponse::from(&user))
    }
}

pub struct ListUsersHandler<S> {
    store: Arc<S>,
}

impl<S> ListUsersHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<S: PersistenceStore> RequestHandler<ListUsersRequest> for ListUsersHandler<S> {
    async fn handle(
        &self,
        _ctx: &RequestContext,
        request: ListUsersRequest,
    ) -> AppResult<ListResponse<UserResponse>> {
        let repository = Repository::new(self.store.clone());
        let mut options = QueryOptions::<User>::new()
            .order_by(|a, b| a.user_name.cmp(&b.user_name));
        if let Some(needle) = request.user_name.filter(|n| !n.trim().is_empty()) {
            let needle = needle.trim().to_lowercase();
            options = options.filter(move |user| user.user_name.to_lowercase().contains(&needle));
        }
        if let Some(include) = request.include {
            options = options.include(include);
        }

        let users = repository.query(options).await?;
        Ok(ListResponse::new(users.iter().map(UserResponse::from).collect()))
    }
}

fn is_blank(field: &Optional<String>) -> bool {
    field.value().trim().is_empty()
}

/// Id must be empty; user name and password are required.
pub struct CreateUserValidator;

#[async_trait::async_trait]
impl Validator<CreateUserRequest> for CreateUserValidator {
    async fn validate(&self, _ctx: &RequestContext, request: &CreateUserRequest) -> ValidationOutcome {
        let data = &request.data;
        let mut outcome = ValidationOutcome::valid();
        outcome
            .check(data.id.trim().is_empty(), "id", "'Id' must be empty.")
            .check(!is_blank(&data.user_name), "userName", "'User Name' must not be empty.")
            .check(!is_blank(&data.password), "password", "'Password' must not be empty.");
        outcome
    }
}

/// Fields that are sent must not be blanked; a body id must match the path id.
pub struct UpdateUserValidator;

#[async_trait::async_trait]
impl Validator<UpdateUserRequest> for UpdateUserValidator {
    async fn validate(&self, _ctx: &RequestContext, request: &UpdateUserRequest) -> ValidationOutcome {
        let data = &request.data;
        let mut outcome = ValidationOutcome::valid();
        if data.user_name.has_value() {
            outcome.check(!is_blank(&data.user_name), "userName", "'User Name' must not be empty.");
        }
        if data.password.has_value() {
            outcome.check(!is_blank(&data.password), "password", "'Password' must not be empty.");
        }
        if !data.id.trim().is_empty() {
            outcome.check(
                parse_identifier(&data.id) == Some(request.id),
                "id",
                "'Id' must match the id in the path.",
            );
        }
        outcome
    }
}

/// User names are unique across all users.
pub struct UniqueUserNameValidator<S> {
    store: Arc<S>,
}

impl<S> UniqueUserNameValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: PersistenceStore> UniqueUserNameValidator<S> {
    async fn check(&self, user_name: &Optional<String>, own_id: Option<Id>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::valid();
        let Optional::Value(user_name) = user_name else {
            return outcome;
        };
        if user_name.trim().is_empty() {
            return outcome;
        }

        let repository = Repository::new(self.store.clone());
        let name = user_name.clone();
        let query = QueryOptions::<User>::new().filter(move |user| user.user_name == name);
        match repository.query(query).await {
            Ok(users) => {
                if users.iter().any(|user| Some(user.id()) != own_id) {
                    outcome.add_failure(
                        "userName",
                        &format!("User name '{}' is already taken.", user_name),
                    );
                }
            }
            Err(error) => outcome.add_coded_failure("userName", &error.to_string(), 500),
        }
        outcome
    }
}

#[async_trait::async_trait]
impl<S: PersistenceStore> Validator<CreateUserRequest> for UniqueUserNameValidator<S> {
    async fn validate(&self, _ctx: &RequestContext, request: &CreateUserRequest) -> ValidationOutcome {
        self.check(&request.data.user_name, None).await
    }
}

#[async_trait::async_trait]
impl<S: PersistenceStore> Validator<UpdateUserRequest> for UniqueUserNameValidator<S> {
    async fn validate(&self, _ctx: &RequestContext, request: &UpdateUserRequest) -> ValidationOutcome {
        self.check(&request.data.user_name, Some(request.id)).await
    }
}

pub fn create_user_pipeline<S: PersistenceStore>(
    store: Arc<S>,
    behaviors: Behaviors,
) -> Pipeline<CreateUserRequest> {
    Pipeline::new(CreateUserHandler::new(store.clone()))
        .with_validator(CreateUserValidator)
        .with_validator(UniqueUserNameValidator::new(store))
        .with_behaviors(behaviors)
}

pub fn update_user_pipeline<S: PersistenceStore>(
    store: Arc<S>,
    behaviors: Behaviors,
) -> Pipeline<UpdateUserRequest> {
    Pipeline::new(UpdateUserHandler::new(store.clone()))
        .with_validator(UpdateUserValidator)
        .with_validator(UniqueUserNameValidator::new(store))
        .with_behaviors(behaviors)
}

pub fn delete_user_pipeline<S: PersistenceStore>(
    store: Arc<S>,
    behaviors: Behaviors,
) -> Pipeline<DeleteUserRequest> {
    Pipeline::new(DeleteUserHandler::new(store)).with_behaviors(behaviors)
}

pub fn get_user_pipeline<S: PersistenceStore>(
    store: Arc<S>,
    behaviors: Behaviors,
) -> Pipeline<GetUserRequest> {
    Pipeline::new(GetUserHandler::new(store)).with_behaviors(behaviors)
}

pub fn list_users_pipeline<S: PersistenceStore>(
    store: Arc<S>,
    behaviors: Behaviors,
) -> Pipeline<ListUsersRequest> {
    Pipeline::new(ListUsersHandler::new(store)).with_behaviors(behaviors)
}
