//! Row ids of every definition, assigned before any row is written.
//!
//! Types are numbered breadth-first: all top-level types in order, then nested types in
//! the order their enclosing types were numbered. Members follow their owning type, so the
//! `*_list` columns of TypeDef and MethodDef always point at contiguous runs. Generic
//! parameters are sorted by owner before they are numbered, because the GenericParam table
//! must be sorted and other tables refer to its rows.

use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};
use crate::model::{EventDefId, FieldDefId, MethodDefId, Module, PropertyDefId, TypeDefId};
use crate::options::WriterOptions;
use crate::tables::{CodedIndex, CodedIndexKind, TableId};

/// The owner of a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericOwner {
    Type(TypeDefId),
    Method(MethodDefId),
}

/// A GenericParam row in row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericParamEntry {
    pub owner: GenericOwner,
    /// Position in the owner's parameter list.
    pub number: u16,
}

/// First rows of the member runs of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLists {
    pub field_list: u32,
    pub method_list: u32,
}

/// Row ids of a table, continuing after the rows of earlier generations.
#[derive(Debug)]
struct RowMap<K> {
    order: Vec<K>,
    rows: HashMap<K, u32>,
    base: u32,
}

impl<K: Copy + Eq + std::hash::Hash + std::fmt::Debug> RowMap<K> {
    fn new(base: u32) -> Self {
        Self {
            order: Vec::new(),
            rows: HashMap::new(),
            base,
        }
    }

    fn next_row(&self) -> u32 {
        self.base + self.order.len() as u32 + 1
    }

    fn add(&mut self, key: K) -> u32 {
        let row = self.next_row();
        self.order.push(key);
        self.rows.insert(key, row);
        row
    }

    fn row(&self, key: K) -> Result<u32> {
        self.rows
            .get(&key)
            .copied()
            .ok_or_else(|| Error::Unresolved(format!("{key:?}")))
    }
}

/// Row ids of the definitions of one module.
#[derive(Debug)]
pub struct DefinitionIndex {
    types: RowMap<TypeDefId>,
    member_lists: HashMap<TypeDefId, MemberLists>,
    fields: RowMap<FieldDefId>,
    methods: RowMap<MethodDefId>,
    param_lists: HashMap<MethodDefId, u32>,
    param_count: u32,
    param_base: u32,
    events: RowMap<EventDefId>,
    properties: RowMap<PropertyDefId>,
    generic_params: RowMap<(GenericOwner, u16)>,
}

impl DefinitionIndex {
    /// Number every definition of `module`.
    pub fn build(module: &Module, options: &WriterOptions) -> Result<Self> {
        let base = |table: TableId| options.delta.as_ref().map_or(0, |d| d.previous_rows(table));
        let mut index = Self {
            types: RowMap::new(base(TableId::TypeDef)),
            member_lists: HashMap::new(),
            fields: RowMap::new(base(TableId::Field)),
            methods: RowMap::new(base(TableId::MethodDef)),
            param_lists: HashMap::new(),
            param_count: 0,
            param_base: base(TableId::Param),
            events: RowMap::new(base(TableId::Event)),
            properties: RowMap::new(base(TableId::Property)),
            generic_params: RowMap::new(base(TableId::GenericParam)),
        };

        let mut queue: VecDeque<TypeDefId> = module.top_level_types().collect();
        while let Some(id) = queue.pop_front() {
            options.cancellation.check()?;
            let def = module.type_def(id);
            index.types.add(id);
            log::trace!("indexing type {}.{}", def.namespace, def.name);

            index.member_lists.insert(
                id,
                MemberLists {
                    field_list: index.fields.next_row(),
                    method_list: index.methods.next_row(),
                },
            );
            for &field in &def.fields {
                index.fields.add(field);
            }
            for &method in &def.methods {
                index.methods.add(method);
                index
                    .param_lists
                    .insert(method, index.param_base + index.param_count + 1);
                index.param_count += module.method(method).params.len() as u32;
            }
            for &event in &def.events {
                index.events.add(event);
            }
            for &property in &def.properties {
                index.properties.add(property);
            }
            queue.extend(def.nested_types.iter().copied());
        }

        index.number_generic_params(module)?;
        log::debug!(
            "definition index: {} types, {} fields, {} methods, {} params, {} generic params",
            index.types.order.len(),
            index.fields.order.len(),
            index.methods.order.len(),
            index.param_count,
            index.generic_params.order.len()
        );
        Ok(index)
    }

    fn number_generic_params(&mut self, module: &Module) -> Result<()> {
        let mut entries = Vec::new();
        for &ty in &self.types.order {
            let count = module.type_def(ty).generic_parameters.len();
            entries.extend((0..count).map(|n| (GenericOwner::Type(ty), n as u16)));
        }
        for &method in &self.methods.order {
            let count = module.method(method).generic_parameters.len();
            entries.extend((0..count).map(|n| (GenericOwner::Method(method), n as u16)));
        }

        let mut keyed = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = self.owner_index(entry.0)?.sort_key(CodedIndexKind::TypeOrMethodDef);
            keyed.push((key, entry));
        }
        keyed.sort_by_key(|(key, _)| *key);
        for (_, entry) in keyed {
            self.generic_params.add(entry);
        }
        Ok(())
    }

    /// Types in row order.
    #[must_use]
    pub fn types(&self) -> &[TypeDefId] {
        &self.types.order
    }

    /// Fields in row order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefId] {
        &self.fields.order
    }

    /// Methods in row order.
    #[must_use]
    pub fn methods(&self) -> &[MethodDefId] {
        &self.methods.order
    }

    /// Events in row order.
    #[must_use]
    pub fn events(&self) -> &[EventDefId] {
        &self.events.order
    }

    /// Properties in row order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDefId] {
        &self.properties.order
    }

    /// GenericParam rows in row order.
    pub fn generic_params(&self) -> impl Iterator<Item = GenericParamEntry> + '_ {
        self.generic_params
            .order
            .iter()
            .map(|&(owner, number)| GenericParamEntry { owner, number })
    }

    pub fn type_row(&self, id: TypeDefId) -> Result<u32> {
        self.types.row(id)
    }

    pub fn field_row(&self, id: FieldDefId) -> Result<u32> {
        self.fields.row(id)
    }

    pub fn method_row(&self, id: MethodDefId) -> Result<u32> {
        self.methods.row(id)
    }

    pub fn event_row(&self, id: EventDefId) -> Result<u32> {
        self.events.row(id)
    }

    pub fn property_row(&self, id: PropertyDefId) -> Result<u32> {
        self.properties.row(id)
    }

    pub fn generic_param_row(&self, owner: GenericOwner, number: u16) -> Result<u32> {
        self.generic_params.row((owner, number))
    }

    pub fn member_lists(&self, id: TypeDefId) -> Result<MemberLists> {
        self.member_lists
            .get(&id)
            .copied()
            .ok_or_else(|| Error::Unresolved(format!("{id:?}")))
    }

    /// First Param row of `method`.
    pub fn param_list(&self, method: MethodDefId) -> Result<u32> {
        self.param_lists
            .get(&method)
            .copied()
            .ok_or_else(|| Error::Unresolved(format!("params of {method:?}")))
    }

    /// Owner of a generic parameter as a `TypeOrMethodDef` coded index.
    pub fn owner_index(&self, owner: GenericOwner) -> Result<CodedIndex> {
        Ok(match owner {
            GenericOwner::Type(ty) => CodedIndex::new(TableId::TypeDef, self.type_row(ty)?),
            GenericOwner::Method(m) => CodedIndex::new(TableId::MethodDef, self.method_row(m)?),
        })
    }
}
