//! End-to-end emit tests: build a module, emit it, and read the output back.

use clremit::attribute::{AttributeValue, CustomAttribute};
use clremit::constant::ConstantValue;
use clremit::content_id::HashAlgorithm;
use clremit::debug::{DocumentChecksum, language};
use clremit::model::{
    AssemblyDef, AssemblyReference, Document, EventDef, FieldDef, ManagedResource,
    MemberReference, MethodBody, MethodDef, MethodSignature, Module, ParameterType,
    PrimitiveType, PropertyDef, ResolutionScope, ResourceLocation, SequencePoint, TypeDef,
    TypeReference,
};
use clremit::tables::{CodedIndexKind, HEAP_ENC_DELTAS, MAX_TABLES};
use clremit::{DeltaOptions, MetadataView, TableId, WriterOptions, emit};
use uguid::Guid;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `T::M` with a one-instruction body.
fn hello_module() -> Module {
    let mut module = Module::new("hello.dll");
    let ty = module.add_type(TypeDef::new("", "T"));
    let void = module.primitive(PrimitiveType::Void);
    let mut method = MethodDef::new("M", 0x0016, MethodSignature::new_static(void, vec![]));
    method.body = Some(MethodBody::new(vec![0x2A], 0));
    let method = module.add_method(ty, method);
    module.entry_point = Some(method);
    module
}

fn core_type(module: &mut Module, name: &str) -> clremit::model::TypeRefId {
    let core = match module.core_library {
        Some(core) => core,
        None => {
            let core = module.add_assembly_ref(AssemblyReference::new("mscorlib", (4, 0, 0, 0)));
            module.core_library = Some(core);
            core
        }
    };
    module.add_type_ref(TypeReference::Namespace {
        scope: ResolutionScope::AssemblyRef(core),
        namespace: "System".to_string(),
        name: name.to_string(),
        is_value_type: false,
    })
}

#[test]
fn test_hello_world_layout() {
    init_logging();
    let module = hello_module();
    let result = emit(&module, &WriterOptions::new()).unwrap();
    let view = MetadataView::parse(&result.metadata).unwrap();

    assert_eq!(
        view.stream_names().collect::<Vec<_>>(),
        ["#~", "#Strings", "#US", "#GUID", "#Blob"]
    );
    for stream in &view.root().streams {
        assert_eq!(stream.offset % 4, 0, "{} is not aligned", stream.name);
    }
    assert_eq!(view.root().total_size(), result.metadata.len());

    let type_def = view.row(TableId::TypeDef, 1).unwrap();
    assert_eq!(view.string(type_def[1]).unwrap(), "T");
    assert_eq!(type_def[5], 1);

    let method = view.row(TableId::MethodDef, 1).unwrap();
    assert_eq!(view.string(method[3]).unwrap(), "M");
    assert_eq!(method[0], 4);
    assert_eq!(view.blob(method[4]).unwrap(), &[0x00, 0x00, 0x01]);

    let module_row = view.row(TableId::Module, 1).unwrap();
    assert_eq!(view.string(module_row[1]).unwrap(), "hello.dll");
    assert_eq!(view.guid(module_row[2]).unwrap(), result.mvid);
}

#[test]
fn test_mvid_follows_content() {
    let a = emit(&hello_module(), &WriterOptions::new()).unwrap();

    let mut module = hello_module();
    let ty = module.top_level_types().next().unwrap();
    module.type_def_mut(ty).name = "U".to_string();
    let b = emit(&module, &WriterOptions::new()).unwrap();

    assert_ne!(a.mvid, b.mvid);
}

#[test]
fn test_attribute_with_null_string() {
    let mut module = hello_module();
    let attribute_type = core_type(&mut module, "ObsoleteAttribute");
    let string = module.primitive(PrimitiveType::String);
    let void = module.primitive(PrimitiveType::Void);
    let constructor = module.add_member_ref(MemberReference::MethodRef {
        parent: attribute_type,
        name: ".ctor".to_string(),
        signature: MethodSignature::new_instance(void, vec![string]),
    });
    let mut attribute = CustomAttribute::new(constructor);
    attribute.fixed_arguments.push(AttributeValue::String(None));
    let ty = module.top_level_types().next().unwrap();
    module.type_def_mut(ty).attributes.push(attribute);

    let result = emit(&module, &WriterOptions::new()).unwrap();
    let view = MetadataView::parse(&result.metadata).unwrap();

    assert_eq!(view.row_count(TableId::CustomAttribute), 1);
    let row = view.row(TableId::CustomAttribute, 1).unwrap();
    let parent = view.coded(CodedIndexKind::HasCustomAttribute, row[0]);
    assert_eq!(parent.table, Some(TableId::TypeDef));
    assert_eq!(parent.row, 1);
    let constructor = view.coded(CodedIndexKind::CustomAttributeType, row[1]);
    assert_eq!(constructor.table, Some(TableId::MemberRef));
    assert_eq!(view.blob(row[2]).unwrap(), &[0x01, 0x00, 0xFF, 0x00, 0x00]);

    let type_ref = view.row(TableId::TypeRef, 1).unwrap();
    assert_eq!(view.string(type_ref[1]).unwrap(), "ObsoleteAttribute");
    assert_eq!(view.string(type_ref[2]).unwrap(), "System");
}

#[test]
fn test_event_map_has_one_row_per_type() {
    let mut module = Module::new("events.dll");
    let handler = core_type(&mut module, "EventHandler");
    let a = module.add_type(TypeDef::new("N", "A"));
    let b = module.add_type(TypeDef::new("N", "B"));
    for (owner, name) in [(a, "A1"), (b, "B1"), (a, "A2"), (b, "B2"), (b, "B3")] {
        module.add_event(
            owner,
            EventDef {
                name: name.to_string(),
                flags: 0,
                event_type: handler,
                adder: None,
                remover: None,
                caller: None,
                others: Vec::new(),
                attributes: Vec::new(),
            },
        );
    }

    let result = emit(&module, &WriterOptions::new()).unwrap();
    let view = MetadataView::parse(&result.metadata).unwrap();

    assert_eq!(view.rows(TableId::EventMap).unwrap(), vec![vec![1, 1], vec![2, 3]]);
    let names: Vec<_> = view
        .rows(TableId::Event)
        .unwrap()
        .iter()
        .map(|row| view.string(row[1]).unwrap())
        .collect();
    assert_eq!(names, ["A1", "A2", "B1", "B2", "B3"]);
}

#[test]
fn test_field_constant_and_mapped_data() {
    let mut module = hello_module();
    let ty = module.top_level_types().next().unwrap();
    let int32 = module.primitive(PrimitiveType::Int32);

    let mut constant = FieldDef::new("Answer", 0x8056, int32);
    constant.constant = Some(ConstantValue::Int32(42));
    module.add_field(ty, constant);
    let mut data = FieldDef::new("Data", 0x0113, int32);
    data.mapped_data = Some(vec![1, 2, 3]);
    module.add_field(ty, data);

    let result = emit(&module, &WriterOptions::new()).unwrap();
    let view = MetadataView::parse(&result.metadata).unwrap();

    assert_eq!(result.mapped_field_data, vec![1, 2, 3, 0, 0, 0, 0, 0]);
    assert_eq!(view.rows(TableId::FieldRva).unwrap(), vec![vec![0, 2]]);

    let row = view.row(TableId::Constant, 1).unwrap();
    assert_eq!(row[0], 0x08);
    let parent = view.coded(CodedIndexKind::HasConstant, row[1]);
    assert_eq!(parent.table, Some(TableId::Field));
    assert_eq!(parent.row, 1);
    assert_eq!(view.blob(row[2]).unwrap(), &42i32.to_le_bytes());
}

#[test]
fn test_assembly_and_resources() {
    let mut module = hello_module();
    module.assembly = Some(AssemblyDef {
        name: "hello".to_string(),
        version: (1, 2, 3, 4),
        ..AssemblyDef::default()
    });
    module.resources.push(ManagedResource {
        name: "data.bin".to_string(),
        is_public: true,
        location: ResourceLocation::Embedded(Box::new(vec![0xAB; 3])),
    });

    let result = emit(&module, &WriterOptions::new()).unwrap();
    let view = MetadataView::parse(&result.metadata).unwrap();

    let assembly = view.row(TableId::Assembly, 1).unwrap();
    assert_eq!(&assembly[1..5], &[1, 2, 3, 4]);
    assert_eq!(view.string(assembly[7]).unwrap(), "hello");

    assert_eq!(result.resources, vec![3, 0, 0, 0, 0xAB, 0xAB, 0xAB, 0]);
    let resource = view.row(TableId::ManifestResource, 1).unwrap();
    assert_eq!(resource[0], 0);
    assert_eq!(resource[1], 1);
    assert_eq!(view.string(resource[2]).unwrap(), "data.bin");
    assert_eq!(resource[3], 0);
}

#[test]
fn test_delta_continues_row_ids() {
    let mut previous = [0; MAX_TABLES];
    previous[TableId::Module as usize] = 1;
    previous[TableId::TypeDef as usize] = 5;
    previous[TableId::MethodDef as usize] = 7;
    let base_mvid = Guid::from_bytes([0x11; 16]);
    let delta = DeltaOptions {
        generation: 1,
        previous_row_counts: previous,
        base_mvid,
        ..DeltaOptions::default()
    };
    let module = hello_module();
    let result = emit(&module, &WriterOptions::new().with_delta(delta.clone())).unwrap();
    let view = MetadataView::parse_with_external(&result.metadata, delta.row_bases()).unwrap();
    assert_eq!(result.mvid, base_mvid);

    let names: Vec<_> = view.stream_names().collect();
    assert_eq!(names[0], "#-");
    assert!(!names.contains(&"#JTD"));
    assert_eq!(view.tables_header().heap_sizes & HEAP_ENC_DELTAS, HEAP_ENC_DELTAS);
    assert_eq!(view.row(TableId::Module, 1).unwrap()[0], 1);

    let map: Vec<u32> = view
        .rows(TableId::EncMap)
        .unwrap()
        .iter()
        .map(|row| row[0])
        .collect();
    // The delta's Module row is always row 1, whatever the baseline had.
    assert_eq!(view.row_count(TableId::Module), 1);
    assert!(map.contains(&TableId::Module.token(1)));
    assert!(!map.contains(&TableId::Module.token(2)));
    assert!(map.contains(&TableId::TypeDef.token(6)));
    assert!(map.contains(&TableId::MethodDef.token(8)));
    assert!(map.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(view.row_count(TableId::EncLog) as usize, map.len());

    let minimal = DeltaOptions {
        minimal: true,
        ..delta
    };
    let result = emit(&module, &WriterOptions::new().with_delta(minimal.clone())).unwrap();
    let view = MetadataView::parse_with_external(&result.metadata, minimal.row_bases()).unwrap();
    assert_eq!(view.stream_names().last(), Some("#JTD"));
    assert_eq!(view.tables_header().heap_sizes & 0x07, 0x07);
    assert_eq!(view.row_count(TableId::TypeDef), 1);
}

#[test]
fn test_debug_metadata() {
    init_logging();
    let mut module = hello_module();
    let document = module.add_document(Document {
        name: "src/hello.cs".to_string(),
        language: language::CSHARP,
        checksum: Some(DocumentChecksum::spawn(
            HashAlgorithm::Sha256,
            b"class T {}".to_vec(),
        )),
    });
    let ty = module.top_level_types().next().unwrap();
    let method = module.type_def(ty).methods[0];
    if let Some(body) = module.method_mut(method).body.as_mut() {
        body.sequence_points.push(SequencePoint {
            document,
            il_offset: 0,
            start_line: 1,
            start_column: 1,
            end_line: 1,
            end_column: 10,
        });
    }

    let result = emit(&module, &WriterOptions::new().with_debug_metadata(true)).unwrap();
    let pdb = result.pdb.as_deref().unwrap();
    let view = MetadataView::parse(pdb).unwrap();

    assert_eq!(view.stream_names().next(), Some("#Pdb"));
    let info = view.pdb().unwrap();
    assert_eq!(info.entry_point, TableId::MethodDef.token(1));
    assert_eq!(info.type_system_row_counts[TableId::MethodDef as usize], 1);
    assert_eq!(info.id, result.pdb_id.unwrap().to_bytes());

    let row = view.row(TableId::Document, 1).unwrap();
    assert_eq!(view.blob(row[0]).unwrap()[0], b'/');
    assert_eq!(view.guid(row[1]).unwrap(), HashAlgorithm::Sha256.guid());
    assert_eq!(view.blob(row[2]).unwrap().len(), 32);
    assert_eq!(view.guid(row[3]).unwrap(), language::CSHARP);

    assert_eq!(view.row_count(TableId::MethodDebugInformation), 1);
    let debug_info = view.row(TableId::MethodDebugInformation, 1).unwrap();
    assert_eq!(debug_info[0], 1);
    assert!(!view.blob(debug_info[1]).unwrap().is_empty());
}

#[test]
fn test_property_semantics_and_local_attribute() {
    let mut module = Module::new("props.dll");
    let ty = module.add_type(TypeDef::new("N", "C"));
    let int32 = module.primitive(PrimitiveType::Int32);
    let void = module.primitive(PrimitiveType::Void);

    let ctor = module.add_method(
        ty,
        MethodDef::new(".ctor", 0x1886, MethodSignature::new_instance(void, vec![])),
    );
    let getter = module.add_method(
        ty,
        MethodDef::new("get_Value", 0x0886, MethodSignature::new_instance(int32, vec![])),
    );
    let setter = module.add_method(
        ty,
        MethodDef::new("set_Value", 0x0886, MethodSignature::new_instance(void, vec![int32])),
    );
    let attribute = CustomAttribute::new(module.method_ref(ctor));
    module.add_property(
        ty,
        PropertyDef {
            name: "Value".to_string(),
            flags: 0,
            has_this: true,
            property_type: ParameterType::new(int32),
            parameters: Vec::new(),
            default_value: None,
            getter: Some(getter),
            setter: Some(setter),
            others: Vec::new(),
            attributes: vec![attribute],
        },
    );

    let options = WriterOptions::new().with_runtime_version("v2.0.50727");
    let result = emit(&module, &options).unwrap();
    let view = MetadataView::parse(&result.metadata).unwrap();

    assert_eq!(view.root().version, "v2.0.50727");
    assert_eq!(view.rows(TableId::PropertyMap).unwrap(), vec![vec![1, 1]]);

    let property = view.row(TableId::Property, 1).unwrap();
    assert_eq!(view.string(property[1]).unwrap(), "Value");
    assert_eq!(view.blob(property[2]).unwrap(), &[0x28, 0x00, 0x08]);

    let semantics: Vec<(u32, u32)> = view
        .rows(TableId::MethodSemantics)
        .unwrap()
        .iter()
        .map(|row| (row[0], row[1]))
        .collect();
    assert_eq!(semantics, vec![(0x0002, 2), (0x0001, 3)]);

    let row = view.row(TableId::CustomAttribute, 1).unwrap();
    let parent = view.coded(CodedIndexKind::HasCustomAttribute, row[0]);
    assert_eq!(parent.table, Some(TableId::Property));
    let constructor = view.coded(CodedIndexKind::CustomAttributeType, row[1]);
    assert_eq!(constructor.table, Some(TableId::MethodDef));
    assert_eq!(constructor.row, 1);
    assert_eq!(view.row_count(TableId::MemberRef), 0);
}
