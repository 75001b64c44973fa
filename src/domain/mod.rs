pub mod group;
pub mod item;
pub mod rule;
pub mod source;

pub use group::Group;
pub use item::Item;
pub use rule::{apply_all, RuleActions, RuleFilter, SearchScope, SourceRule};
pub use source::{Source, SourceLookup};
