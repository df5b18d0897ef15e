use crate::types::ClassId;

/// Which side owns a field's value for a given (local class, connected
/// class) pair. The default with no matching filter is `Dominated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthorityTag {
    Dominant,
    Relay,
    Dominated,
}

/// What a filter applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterTarget {
    Any,
    Class(ClassId),
}

impl FilterTarget {
    pub fn matches(&self, class: ClassId) -> bool {
        match self {
            FilterTarget::Any => true,
            FilterTarget::Class(target) => *target == class,
        }
    }
}

/// One entry of a field's ordered authority declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorityFilter {
    pub target: FilterTarget,
    pub tag: AuthorityTag,
}

impl AuthorityFilter {
    pub fn new(target: FilterTarget, tag: AuthorityTag) -> Self {
        Self { target, tag }
    }
}

/// Resolve a field's authority tag when evaluated toward `class`.
/// The last matching filter wins; declaration order breaks ties.
pub fn resolve_tag(filters: &[AuthorityFilter], toward: ClassId) -> AuthorityTag {
    let mut tag = AuthorityTag::Dominated;
    for filter in filters {
        if filter.target.matches(toward) {
            tag = filter.tag;
        }
    }
    tag
}

/// One entry of an inbound-call allow-list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassFilter {
    pub target: FilterTarget,
    pub allow: bool,
}

impl ClassFilter {
    pub fn new(target: FilterTarget, allow: bool) -> Self {
        Self { target, allow }
    }
}

/// Ordered allow-list evaluated against a caller's advertised class.
/// An empty list permits every caller; once filters are declared, a class no
/// filter matches is denied.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    filters: Vec<ClassFilter>,
}

impl AllowList {
    pub fn new(filters: Vec<ClassFilter>) -> Self {
        Self { filters }
    }

    pub fn allow_any() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn allows(&self, class: ClassId) -> bool {
        let mut verdict = self.filters.is_empty();
        for filter in &self.filters {
            if filter.target.matches(class) {
                verdict = filter.allow;
            }
        }
        verdict
    }
}
