mod cache;
mod compiler;
mod config;
mod context;
mod engine;
mod error;
mod interface;
mod locator;
mod parser;
mod resolver;
mod segment;
mod support;
mod tag;
mod template;
mod value;

// Public exports.
pub use cache::{ComputingCache, ComputingCacheBuilder, OverflowPolicy, RemovalCause, RemovalListener};
pub use config::Configuration;
pub use context::{ExecutionContext, ReleaseError, ResolutionContext, ValueWrapper};
pub use engine::{MustachioEngine, MustachioEngineBuilder};
pub use error::{MustachioError, MustachioResult, ParseError, ParseErrorKind};
pub use interface::MustachioInterface;
pub use locator::{MapTemplateLocator, TemplateLocator};
pub use resolver::{
    GlobalDataResolver, Hint, IterationMeta, IterationMetaResolver, ListIndexResolver, MapResolver,
    ReflectionResolver, Resolver, ThisResolver,
};
pub use segment::{HintSlot, Origin, Segment, ValueKey};
pub use support::{
    DotKeySplitter, HtmlTextSupport, KeySplitter, MissingValueHandler, NoOpMissingValueHandler, TextSupport,
    ThrowingMissingValueHandler,
};
pub use tag::{DEFAULT_END_DELIMITER, DEFAULT_START_DELIMITER, Delimiters, TagType};
pub use template::Template;
pub use value::{InputType, Lambda, Object, Value};
