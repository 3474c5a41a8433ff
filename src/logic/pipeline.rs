//! Request pipeline: handlers wrapped by ordered, individually switchable
//! behaviors (exception logging, request logging, validation).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logging::Logger;
use crate::logic::mapping::short_type_name;
use crate::logic::results::{aggregate_validation_failures, map_error, ValidationOutcome};
use crate::model::{generate_id, AppResult, Failure, UserContext};

/// Per-request state handed to every behavior, validator and handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub user: UserContext,
    pub logger: Logger,
}

impl RequestContext {
    pub fn new(user: UserContext) -> Self {
        let request_id = generate_id();
        let logger = Logger::new("hendry_template::request")
            .with_scope("request_id", request_id)
            .with_scope("user", &user.user_id);
        Self {
            request_id,
            user,
            logger,
        }
    }

    pub fn system() -> Self {
        Self::new(UserContext::system())
    }
}

pub trait Request: Serialize + Send + Sync + 'static {
    type Response: Send + 'static;

    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

#[async_trait::async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, request: R) -> AppResult<R::Response>;
}

#[async_trait::async_trait]
pub trait Validator<R: Request>: Send + Sync {
    async fn validate(&self, ctx: &RequestContext, request: &R) -> ValidationOutcome;
}

#[async_trait::async_trait]
pub trait Behavior<R: Request>: Send + Sync {
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: R,
        next: Next<'_, R>,
    ) -> AppResult<R::Response>;
}

/// The rest of the chain after the current behavior.
pub struct Next<'a, R: Request> {
    behaviors: &'a [Arc<dyn Behavior<R>>],
    handler: &'a dyn RequestHandler<R>,
}

impl<'a, R: Request> Next<'a, R> {
    pub async fn run(self, ctx: &RequestContext, request: R) -> AppResult<R::Response> {
        match self.behaviors.split_first() {
            Some((behavior, rest)) => {
                let next = Next {
                    behaviors: rest,
                    handler: self.handler,
                };
                behavior.handle(ctx, request, next).await
            }
            None => self.handler.handle(ctx, request).await,
        }
    }
}

fn payload<R: Request>(request: &R) -> String {
    serde_json::to_string(request).unwrap_or_else(|_| "<unserializable>".to_string())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Outermost behavior: logs panics and re-raises them. Failed results pass
/// through untouched and are logged once where they are rendered.
pub struct ExceptionBehavior;

#[async_trait::async_trait]
impl<R: Request> Behavior<R> for ExceptionBehavior {
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: R,
        next: Next<'_, R>,
    ) -> AppResult<R::Response> {
        let body = payload(&request);
        match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                ctx.logger.error(format_args!(
                    "Request: Unhandled panic for request {} {}: {}",
                    R::name(),
                    body,
                    panic_message(panic.as_ref())
                ));
                std::panic::resume_unwind(panic)
            }
        }
    }
}

/// Logs the request name and payload before the rest of the chain runs.
pub struct LoggingBehavior;

#[async_trait::async_trait]
impl<R: Request> Behavior<R> for LoggingBehavior {
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: R,
        next: Next<'_, R>,
    ) -> AppResult<R::Response> {
        ctx.logger
            .info(format_args!("Request: {} {}", R::name(), payload(&request)));
        next.run(ctx, request).await
    }
}

/// Runs every validator concurrently; any failure short-circuits the handler.
pub struct ValidationBehavior<R: Request> {
    validators: Vec<Arc<dyn Validator<R>>>,
}

impl<R: Request> ValidationBehavior<R> {
    pub fn new(validators: Vec<Arc<dyn Validator<R>>>) -> Self {
        Self { validators }
    }
}

#[async_trait::async_trait]
impl<R: Request> Behavior<R> for ValidationBehavior<R> {
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: R,
        next: Next<'_, R>,
    ) -> AppResult<R::Response> {
        if !self.validators.is_empty() {
            let outcomes = join_all(
                self.validators
                    .iter()
                    .map(|validator| validator.validate(ctx, &request)),
            )
            .await;
            if let Err(error) = aggregate_validation_failures(outcomes) {
                return Err(Failure::new(map_error(error)));
            }
        }
        next.run(ctx, request).await
    }
}

/// Which behaviors wrap the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behaviors {
    pub exception: bool,
    pub logging: bool,
    pub validation: bool,
}

impl Default for Behaviors {
    fn default() -> Self {
        Self {
            exception: true,
            logging: true,
            validation: true,
        }
    }
}

/// A handler with its validators and behaviors, ready to receive requests.
pub struct Pipeline<R: Request> {
    handler: Arc<dyn RequestHandler<R>>,
    validators: Vec<Arc<dyn Validator<R>>>,
    extra: Vec<Arc<dyn Behavior<R>>>,
    behaviors: Behaviors,
}

impl<R: Request> Pipeline<R> {
    pub fn new(handler: impl RequestHandler<R> + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            validators: Vec::new(),
            extra: Vec::new(),
            behaviors: Behaviors::default(),
        }
    }

    pub fn with_validator(mut self, validator: impl Validator<R> + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn with_behaviors(mut self, behaviors: Behaviors) -> Self {
        self.behaviors = behaviors;
        self
    }

    /// Add a behavior that runs after the built-in ones, right before the handler.
    pub fn with_behavior(mut self, behavior: impl Behavior<R> + 'static) -> Self {
        self.extra.push(Arc::new(behavior));
        self
    }

    /// Chain in execution order: exception, logging, validation, extras.
    fn chain(&self) -> Vec<Arc<dyn Behavior<R>>> {
        let mut chain: Vec<Arc<dyn Behavior<R>>> = Vec::new();
        if self.behaviors.exception {
            chain.push(Arc::new(ExceptionBehavior));
        }
        if self.behaviors.logging {
            chain.push(Arc::new(LoggingBehavior));
        }
        if self.behaviors.validation {
            chain.push(Arc::new(ValidationBehavior::new(self.validators.clone())));
        }
        chain.extend(self.extra.iter().cloned());
        chain
    }

    pub async fn send(&self, ctx: &RequestContext, request: R) -> AppResult<R::Response> {
        let chain = self.chain();
        Next {
            behaviors: &chain,
            handler: self.handler.as_ref(),
        }
        .run(ctx, request)
        .await
    }
}
