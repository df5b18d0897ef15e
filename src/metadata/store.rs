use std::collections::HashMap;

use log::info;

use crate::{
    messages::value::Value,
    metadata::{
        error::ConfigError,
        field::FieldDescriptor,
        filter::{resolve_tag, AuthorityTag},
        method::{InvokeError, MethodDescriptor},
    },
    types::{ClassId, ConstructorId, FieldId, MethodId, SetId},
    world::instance::Instance,
};

/// Builds an entity instance from replicated construction parameters.
pub type Constructor = Box<dyn Fn(&[Value]) -> Result<Box<dyn Instance>, InvokeError>>;

/// An update set derived from the field declarations that named it.
#[derive(Clone, Debug)]
pub struct UpdateSetInfo {
    pub id: SetId,
    pub interval_millis: u64,
    pub reliable: bool,
    /// Declared membership, in declaration order.
    pub members: Vec<FieldId>,
}

/// Everything declared for one (local class, connected class) pair. Built
/// once through [`MetadataStore::register_pair`] and immutable afterward.
pub struct PairMetadata {
    pub local_class: ClassId,
    pub connected_class: ClassId,
    fields: HashMap<FieldId, FieldDescriptor>,
    sets: Vec<UpdateSetInfo>,
    methods: HashMap<MethodId, MethodDescriptor>,
}

impl PairMetadata {
    pub fn field(&self, id: FieldId) -> Option<&FieldDescriptor> {
        self.fields.get(&id)
    }

    pub fn sets(&self) -> &[UpdateSetInfo] {
        &self.sets
    }

    pub fn method(&self, id: MethodId) -> Option<&MethodDescriptor> {
        self.methods.get(&id)
    }

    /// The field's tag as this side resolves it: evaluated toward the
    /// connected class.
    pub fn local_tag(&self, field: &FieldDescriptor) -> AuthorityTag {
        resolve_tag(&field.filters, self.connected_class)
    }

    /// The field's tag as the connected side resolves it: the same
    /// declaration, evaluated toward the local class.
    pub fn remote_tag(&self, field: &FieldDescriptor) -> AuthorityTag {
        resolve_tag(&field.filters, self.local_class)
    }
}

/// Declaration handed to [`MetadataStore::register_pair`].
pub struct PairDescriptor {
    pub local_class: ClassId,
    pub connected_class: ClassId,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

/// The immutable table of class, pair, and constructor declarations. Built
/// at startup, validated as it is built, then passed into the endpoint and
/// never mutated again.
pub struct MetadataStore {
    class_names: Vec<String>,
    name_to_class: HashMap<String, ClassId>,
    constructors: HashMap<(ClassId, ConstructorId), Constructor>,
    pairs: HashMap<(ClassId, ClassId), PairMetadata>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            class_names: Vec::new(),
            name_to_class: HashMap::new(),
            constructors: HashMap::new(),
            pairs: HashMap::new(),
        }
    }

    /// Register a class name, returning its id. Registering the same name
    /// twice returns the existing id.
    pub fn register_class(&mut self, name: &str) -> ClassId {
        if let Some(existing) = self.name_to_class.get(name) {
            return *existing;
        }
        let id = ClassId::new(self.class_names.len() as u16);
        self.class_names.push(name.to_string());
        self.name_to_class.insert(name.to_string(), id);
        id
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.name_to_class.get(name).copied()
    }

    pub fn class_name(&self, class: ClassId) -> Option<&str> {
        self.class_names.get(class.value() as usize).map(|s| s.as_str())
    }

    pub fn has_class(&self, class: ClassId) -> bool {
        (class.value() as usize) < self.class_names.len()
    }

    /// Register a replication constructor for a class.
    pub fn register_constructor(
        &mut self,
        class: ClassId,
        constructor: ConstructorId,
        builder: Constructor,
    ) -> Result<(), ConfigError> {
        let class_name = self.require_class(class)?;
        if self.constructors.contains_key(&(class, constructor)) {
            return Err(ConfigError::DuplicateConstructor {
                constructor: constructor.value(),
                class: class_name,
            });
        }
        self.constructors.insert((class, constructor), builder);
        Ok(())
    }

    /// Build an instance of `class` from replicated construction parameters.
    pub fn construct(
        &self,
        class: ClassId,
        constructor: ConstructorId,
        params: &[Value],
    ) -> Result<Box<dyn Instance>, InvokeError> {
        let builder = self.constructors.get(&(class, constructor)).ok_or_else(|| {
            InvokeError::new(format!(
                "no constructor {} registered for class {:?}",
                constructor.value(),
                class
            ))
        })?;
        builder(params)
    }

    /// Register the full declaration for one class pair, validating it.
    /// Violations are fatal configuration errors; startup must abort.
    pub fn register_pair(&mut self, descriptor: PairDescriptor) -> Result<(), ConfigError> {
        let local_name = self.require_class(descriptor.local_class)?;
        let connected_name = self.require_class(descriptor.connected_class)?;
        let key = (descriptor.local_class, descriptor.connected_class);
        if self.pairs.contains_key(&key) {
            return Err(ConfigError::DuplicatePair {
                local: local_name,
                connected: connected_name,
            });
        }

        let mut fields = HashMap::new();
        let mut sets: Vec<UpdateSetInfo> = Vec::new();
        for field in descriptor.fields {
            if fields.contains_key(&field.id) {
                return Err(ConfigError::DuplicateField {
                    field: field.name,
                    local: local_name,
                    connected: connected_name,
                });
            }

            let local_tag = resolve_tag(&field.filters, descriptor.connected_class);
            let remote_tag = resolve_tag(&field.filters, descriptor.local_class);
            if local_tag == remote_tag && local_tag != AuthorityTag::Dominated {
                return Err(ConfigError::AmbiguousAuthority {
                    field: field.name,
                    tag: local_tag,
                    local: local_name,
                    connected: connected_name,
                });
            }

            if let Some(binding) = &field.set {
                let interval_millis = binding.interval.as_millis() as u64;
                if let Some(info) = sets.iter_mut().find(|info| info.id == binding.set) {
                    if info.interval_millis != interval_millis || info.reliable != binding.reliable
                    {
                        let first = fields
                            .get(&info.members[0])
                            .map(|f: &FieldDescriptor| f.name.clone())
                            .unwrap_or_default();
                        return Err(ConfigError::UpdateSetMismatch {
                            set: binding.set.value(),
                            first,
                            second: field.name,
                        });
                    }
                    info.members.push(field.id);
                } else {
                    sets.push(UpdateSetInfo {
                        id: binding.set,
                        interval_millis,
                        reliable: binding.reliable,
                        members: vec![field.id],
                    });
                }
            }

            fields.insert(field.id, field);
        }

        let mut methods = HashMap::new();
        for method in descriptor.methods {
            if methods.contains_key(&method.id) {
                return Err(ConfigError::DuplicateMethod {
                    method: method.name,
                    local: local_name,
                    connected: connected_name,
                });
            }
            methods.insert(method.id, method);
        }

        info!(
            "MetadataStore: registered pair ('{}', '{}') with {} fields, {} sets, {} methods",
            local_name,
            connected_name,
            fields.len(),
            sets.len(),
            methods.len()
        );

        self.pairs.insert(
            key,
            PairMetadata {
                local_class: descriptor.local_class,
                connected_class: descriptor.connected_class,
                fields,
                sets,
                methods,
            },
        );
        Ok(())
    }

    pub fn pair(&self, local: ClassId, connected: ClassId) -> Option<&PairMetadata> {
        self.pairs.get(&(local, connected))
    }

    fn require_class(&self, class: ClassId) -> Result<String, ConfigError> {
        self.class_name(class)
            .map(|name| name.to_string())
            .ok_or_else(|| ConfigError::UnknownClass {
                name: format!("#{}", class.value()),
            })
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}
