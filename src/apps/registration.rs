//! Application registration records.
//!
//! # Responsibilities
//! - Define the lifecycle capability set and the loader seam
//! - Normalize positional and config-record registrations into one record
//! - Validate names, loaders, activation rules and custom props
//!
//! # Design Decisions
//! - A plain lifecycle value is wrapped in a loader that resolves immediately,
//!   so every registration loads through the same async path
//! - Activation rules are compiled here; the registry only sees a `Matcher`
//! - Validation is a pure function returning `Result`

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::apps::errors::{LifecycleError, OrchestratorError};
use crate::routing::{ActiveWhen, Location, Matcher};

/// Props handed to lifecycle functions.
pub type Props = Map<String, Value>;

/// Result of one lifecycle function.
pub type LifecycleFuture = BoxFuture<'static, Result<(), LifecycleError>>;

/// The async operations a module exposes once loaded.
pub trait Lifecycles: Send + Sync {
    fn bootstrap(&self, props: Props) -> LifecycleFuture;

    fn mount(&self, props: Props) -> LifecycleFuture;

    fn unmount(&self, props: Props) -> LifecycleFuture;

    /// Optional: modules without an unload hook unload trivially.
    fn unload(&self, _props: Props) -> LifecycleFuture {
        Box::pin(async { Ok(()) })
    }

    /// Optional: called when props change while mounted.
    fn update(&self, _props: Props) -> LifecycleFuture {
        Box::pin(async { Ok(()) })
    }
}

/// Async factory yielding a module's lifecycle set.
pub trait AppLoader: Send + Sync {
    fn load(&self, props: Props) -> BoxFuture<'static, Result<Arc<dyn Lifecycles>, LifecycleError>>;
}

/// Loader that resolves immediately with an already-available module.
pub struct ReadyLoader {
    lifecycles: Arc<dyn Lifecycles>,
}

impl ReadyLoader {
    pub fn new(lifecycles: Arc<dyn Lifecycles>) -> Self {
        Self { lifecycles }
    }
}

impl AppLoader for ReadyLoader {
    fn load(&self, _props: Props) -> BoxFuture<'static, Result<Arc<dyn Lifecycles>, LifecycleError>> {
        let lifecycles = self.lifecycles.clone();
        Box::pin(async move { Ok(lifecycles) })
    }
}

/// Adapts an async closure into an [`AppLoader`].
pub struct FnLoader<F>(F);

impl<F, Fut> AppLoader for FnLoader<F>
where
    F: Fn(Props) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Arc<dyn Lifecycles>, LifecycleError>> + Send + 'static,
{
    fn load(&self, props: Props) -> BoxFuture<'static, Result<Arc<dyn Lifecycles>, LifecycleError>> {
        Box::pin((self.0)(props))
    }
}

/// Build a loader from an async closure.
pub fn loader_fn<F, Fut>(f: F) -> Arc<dyn AppLoader>
where
    F: Fn(Props) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Lifecycles>, LifecycleError>> + Send + 'static,
{
    Arc::new(FnLoader(f))
}

/// What the caller registered as the application body.
#[derive(Clone)]
pub enum AppSource {
    /// Loads the module on demand.
    Loader(Arc<dyn AppLoader>),
    /// Module already in hand.
    Value(Arc<dyn Lifecycles>),
}

impl AppSource {
    fn into_loader(self) -> Arc<dyn AppLoader> {
        match self {
            AppSource::Loader(loader) => loader,
            AppSource::Value(lifecycles) => Arc::new(ReadyLoader::new(lifecycles)),
        }
    }
}

/// Props computed per application and location.
pub type DynamicProps = Arc<dyn Fn(&str, &Location) -> Props + Send + Sync>;

/// Custom props passed to every lifecycle function.
#[derive(Clone)]
pub enum CustomProps {
    Static(Props),
    Dynamic(DynamicProps),
}

impl Default for CustomProps {
    fn default() -> Self {
        CustomProps::Static(Props::new())
    }
}

impl CustomProps {
    /// Validate the untyped form: `null` means omitted, an object is static
    /// props, anything else is rejected.
    pub fn from_value(value: &Value) -> Result<Option<Self>, OrchestratorError> {
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(CustomProps::Static(map.clone()))),
            _ => Err(OrchestratorError::InvalidCustomProps),
        }
    }

    pub fn resolve(&self, name: &str, location: &Location) -> Props {
        match self {
            CustomProps::Static(props) => props.clone(),
            CustomProps::Dynamic(f) => f(name, location),
        }
    }

    pub fn as_static(&self) -> Option<&Props> {
        match self {
            CustomProps::Static(props) => Some(props),
            CustomProps::Dynamic(_) => None,
        }
    }
}

/// Registration by config record.
#[derive(Clone)]
pub struct AppConfig {
    pub name: String,
    pub app: AppSource,
    pub active_when: ActiveWhen,
    pub custom_props: Option<CustomProps>,
}

/// The two accepted registration shapes.
pub enum RegisterArgs {
    Positional {
        name: String,
        app: AppSource,
        active_when: ActiveWhen,
        custom_props: Option<CustomProps>,
    },
    Config(AppConfig),
}

impl From<AppConfig> for RegisterArgs {
    fn from(config: AppConfig) -> Self {
        RegisterArgs::Config(config)
    }
}

/// Canonical, validated registration.
pub struct Registration {
    name: String,
    loader: Arc<dyn AppLoader>,
    active_when: Arc<dyn Matcher>,
    custom_props: CustomProps,
}

impl Registration {
    /// Validate and normalize either registration shape.
    pub fn sanitize(args: RegisterArgs) -> Result<Self, OrchestratorError> {
        let (name, app, active_when, custom_props) = match args {
            RegisterArgs::Positional {
                name,
                app,
                active_when,
                custom_props,
            } => (name, app, active_when, custom_props),
            RegisterArgs::Config(config) => (
                config.name,
                config.app,
                config.active_when,
                config.custom_props,
            ),
        };

        if name.is_empty() {
            return Err(OrchestratorError::InvalidName);
        }

        Ok(Self {
            name,
            loader: app.into_loader(),
            active_when: active_when.into_matcher()?,
            custom_props: custom_props.unwrap_or_default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn loader(&self) -> &Arc<dyn AppLoader> {
        &self.loader
    }

    pub fn custom_props(&self) -> &CustomProps {
        &self.custom_props
    }

    pub fn is_active(&self, location: &Location) -> bool {
        self.active_when.matches(location)
    }

    /// Props for a lifecycle call: custom props plus the app's `name`.
    pub fn props_for(&self, location: &Location) -> Props {
        let mut props = self.custom_props.resolve(&self.name, location);
        props.insert("name".to_string(), Value::String(self.name.clone()));
        props
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("active_when", &self.active_when)
            .finish_non_exhaustive()
    }
}
