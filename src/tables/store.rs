//! Row storage for a tables stream.

use super::rows::*;
use crate::error::Result;
use crate::tables::{
    MAX_TABLES, RowWriter, SORTED_DEBUG_TABLES, SORTED_TYPE_SYSTEM_TABLES, TableRow,
};

/// An append-only table whose row ids are `base + position + 1`.
#[derive(Debug, Clone)]
pub struct Table<R> {
    rows: Vec<R>,
    /// Rows of this table in earlier generations.
    base: u32,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            base: 0,
        }
    }
}

impl<R: TableRow> Table<R> {
    /// Append a row and return its row id.
    pub fn add(&mut self, row: R) -> u32 {
        self.rows.push(row);
        self.base + self.rows.len() as u32
    }

    /// Row id the next added row will get.
    #[must_use]
    pub fn next_row_id(&self) -> u32 {
        self.base + self.rows.len() as u32 + 1
    }

    /// Number of rows in this generation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows in this generation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the rows.
    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.rows.iter()
    }

    /// Get a row by row id.
    #[must_use]
    pub fn get(&self, row_id: u32) -> Option<&R> {
        let index = row_id.checked_sub(self.base + 1)?;
        self.rows.get(index as usize)
    }

    /// Get a row by row id for patching.
    pub fn get_mut(&mut self, row_id: u32) -> Option<&mut R> {
        let index = row_id.checked_sub(self.base + 1)?;
        self.rows.get_mut(index as usize)
    }

    /// Stable sort by the table's key column.
    pub fn sort(&mut self) {
        self.rows.sort_by_key(|row| row.sort_key());
    }

    fn tokens(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.rows.len() as u32).map(|i| R::TABLE.token(self.base + i + 1))
    }

    fn write_rows(&self, w: &mut RowWriter<'_>) -> Result<()> {
        for row in &self.rows {
            row.write(w)?;
        }
        Ok(())
    }
}

/// A group of tables serialized together into one tables stream.
pub trait TableSet: Default {
    /// Tables of this set that must be sorted by their key column.
    const SORTED: u64;

    /// Row counts of this generation indexed by table id.
    fn row_counts(&self) -> [u32; MAX_TABLES];

    /// Continue row ids after the row counts of earlier generations.
    fn set_bases(&mut self, previous: &[u32; MAX_TABLES]);

    /// Stable sort every table whose bit is set in `mask`.
    fn sort(&mut self, mask: u64);

    /// Tokens of every row of this generation, in table order.
    fn tokens(&self) -> Vec<u32>;

    /// Write all rows, table by table in table id order.
    fn write_rows(&self, w: &mut RowWriter<'_>) -> Result<()>;
}

macro_rules! table_set {
    ($(#[$meta:meta])* $name:ident sorted $sorted:expr; { $($field:ident: $row:ty,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            $(pub $field: Table<$row>,)*
        }

        impl TableSet for $name {
            const SORTED: u64 = $sorted;

            fn row_counts(&self) -> [u32; MAX_TABLES] {
                let mut counts = [0; MAX_TABLES];
                $(counts[<$row as TableRow>::TABLE as usize] = self.$field.len() as u32;)*
                counts
            }

            fn set_bases(&mut self, previous: &[u32; MAX_TABLES]) {
                $(self.$field.base = previous[<$row as TableRow>::TABLE as usize];)*
            }

            fn sort(&mut self, mask: u64) {
                $(
                    if mask & <$row as TableRow>::TABLE.mask() != 0 {
                        self.$field.sort();
                    }
                )*
            }

            fn tokens(&self) -> Vec<u32> {
                let mut tokens = Vec::new();
                $(tokens.extend(self.$field.tokens());)*
                tokens
            }

            fn write_rows(&self, w: &mut RowWriter<'_>) -> Result<()> {
                $(self.$field.write_rows(w)?;)*
                Ok(())
            }
        }
    };
}

table_set! {
    /// The type-system tables of a `#~` or `#-` stream, in table id order.
    TypeSystemTables sorted SORTED_TYPE_SYSTEM_TABLES; {
        module: ModuleRow,
        type_ref: TypeRefRow,
        type_def: TypeDefRow,
        field: FieldRow,
        method_def: MethodDefRow,
        param: ParamRow,
        interface_impl: InterfaceImplRow,
        member_ref: MemberRefRow,
        constant: ConstantRow,
        custom_attribute: CustomAttributeRow,
        field_marshal: FieldMarshalRow,
        decl_security: DeclSecurityRow,
        class_layout: ClassLayoutRow,
        field_layout: FieldLayoutRow,
        stand_alone_sig: StandAloneSigRow,
        event_map: EventMapRow,
        event: EventRow,
        property_map: PropertyMapRow,
        property: PropertyRow,
        method_semantics: MethodSemanticsRow,
        method_impl: MethodImplRow,
        module_ref: ModuleRefRow,
        type_spec: TypeSpecRow,
        impl_map: ImplMapRow,
        field_rva: FieldRvaRow,
        enc_log: EncLogRow,
        enc_map: EncMapRow,
        assembly: AssemblyRow,
        assembly_ref: AssemblyRefRow,
        file: FileRow,
        exported_type: ExportedTypeRow,
        manifest_resource: ManifestResourceRow,
        nested_class: NestedClassRow,
        generic_param: GenericParamRow,
        method_spec: MethodSpecRow,
        generic_param_constraint: GenericParamConstraintRow,
    }
}

table_set! {
    /// The Portable PDB tables, in table id order.
    DebugTables sorted SORTED_DEBUG_TABLES; {
        document: DocumentRow,
        method_debug_information: MethodDebugInformationRow,
        local_scope: LocalScopeRow,
        local_variable: LocalVariableRow,
        local_constant: LocalConstantRow,
        import_scope: ImportScopeRow,
        state_machine_method: StateMachineMethodRow,
        custom_debug_information: CustomDebugInformationRow,
    }
}

impl TypeSystemTables {
    /// Fill EncLog and EncMap with one entry per row of this generation.
    pub fn populate_enc_tables(&mut self) {
        let tokens = self.tokens();
        for &token in &tokens {
            self.enc_log.add(EncLogRow {
                token,
                func_code: 0,
            });
        }
        let mut sorted = tokens;
        sorted.sort_unstable();
        for token in sorted {
            self.enc_map.add(EncMapRow { token });
        }
        log::debug!("EncLog/EncMap: {} entries", self.enc_map.len());
    }

    /// The single Module row.
    #[must_use]
    pub fn module_row(&self) -> Option<&ModuleRow> {
        self.module.rows().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{CodedIndex, TableId};

    #[test]
    fn test_row_ids_are_positions() {
        let mut tables = TypeSystemTables::default();
        assert_eq!(tables.type_def.next_row_id(), 1);
        assert_eq!(tables.type_def.add(TypeDefRow::default()), 1);
        assert_eq!(tables.type_def.add(TypeDefRow::default()), 2);
        assert!(tables.type_def.get(2).is_some());
        assert!(tables.type_def.get(0).is_none());
        assert!(tables.type_def.get(3).is_none());
        let counts = tables.row_counts();
        assert_eq!(counts[TableId::TypeDef as usize], 2);
        assert_eq!(counts[TableId::Field as usize], 0);
    }

    #[test]
    fn test_sorted_tables_are_stable() {
        let mut tables = TypeSystemTables::default();
        for (parent, value) in [(3, 10), (1, 11), (3, 12), (1, 13)] {
            tables.custom_attribute.add(CustomAttributeRow {
                parent: CodedIndex::new(TableId::TypeDef, parent),
                constructor: CodedIndex::new(TableId::MemberRef, 1),
                value,
            });
        }
        tables.sort(TableId::CustomAttribute.mask());
        let values: Vec<_> = tables.custom_attribute.rows().map(|r| r.value).collect();
        assert_eq!(values, vec![11, 13, 10, 12]);
    }

    #[test]
    fn test_enc_tables() {
        let mut tables = TypeSystemTables::default();
        let mut previous = [0; MAX_TABLES];
        previous[TableId::MethodDef as usize] = 4;
        tables.set_bases(&previous);
        tables.module.add(ModuleRow::default());
        assert_eq!(tables.method_def.add(MethodDefRow::default()), 5);
        tables.populate_enc_tables();

        let log: Vec<_> = tables.enc_log.rows().map(|r| r.token).collect();
        assert_eq!(log, vec![0x0000_0001, 0x0600_0005]);
        let map: Vec<_> = tables.enc_map.rows().map(|r| r.token).collect();
        assert_eq!(map, log);
    }
}
