////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    report::SERIAL_LOG,
    serial::{
        node::{ConstantRecord, Node, ParameterRecord},
        AssemblyRef,
        DeserializeConfig,
        DeserializeContext,
        MemberRef,
        SerialError,
        SerialResult,
        SerializeContext,
        TypeRef,
    },
    tree::Expr,
};

/// The version of the document layout produced by this implementation.
pub const FORMAT_VERSION: u32 = 1;

/// A serialized expression tree.
///
/// The document consists of the reference tables and the root node. The
/// nodes refer to the entries of the tables by index, so a type, a member,
/// a parameter or a constant that occurs in the tree several times is
/// described once.
///
/// ```ignore
/// let document = Document::serialize(&expr)?;
///
/// let text = document.to_json()?;
///
/// let restored = Document::from_json(&text)?.deserialize()?;
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    pub assemblies: Vec<AssemblyRef>,
    pub types: Vec<TypeRef>,
    pub members: Vec<MemberRef>,
    pub constants: Vec<ConstantRecord>,
    pub parameters: Vec<ParameterRecord>,
    pub root: Node,
}

impl Document {
    /// Serializes an expression tree into a new document.
    pub fn serialize(expr: &Expr) -> SerialResult<Self> {
        let mut context = SerializeContext::new();

        let root = context.node(expr)?;

        Ok(context.finish(root))
    }

    /// Rebuilds the expression tree with the default
    /// [configuration](DeserializeConfig).
    #[inline(always)]
    pub fn deserialize(&self) -> SerialResult<Expr> {
        self.deserialize_with(DeserializeConfig::new())
    }

    /// Rebuilds the expression tree.
    ///
    /// The result is equivalent to the serialized tree, but not necessarily
    /// identical: the omitted types are re-inferred, and the parameters and
    /// constants are new instances.
    pub fn deserialize_with(&self, config: DeserializeConfig) -> SerialResult<Expr> {
        self.check_version()?;

        let expr = DeserializeContext::new(self, config).root()?;

        debug!(
            target: SERIAL_LOG,
            "Document deserialized into {} expression.",
            expr.name(),
        );

        Ok(expr)
    }

    /// Renders the document as a JSON text.
    #[inline(always)]
    pub fn to_json(&self) -> SerialResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a document from a JSON text.
    ///
    /// Fails with UnsupportedVersion if the document was produced by an
    /// incompatible implementation.
    pub fn from_json(text: &str) -> SerialResult<Self> {
        let document: Self = serde_json::from_str(text)?;

        document.check_version()?;

        Ok(document)
    }

    #[inline(always)]
    fn check_version(&self) -> SerialResult<()> {
        if self.version != FORMAT_VERSION {
            return Err(SerialError::UnsupportedVersion {
                found: self.version,
                expected: FORMAT_VERSION,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::{
        runtime::{Domain, MemberMeta, MethodDecl, TypeMeta, Value},
        serial::{
            ConstantValue,
            DeserializeConfig,
            Document,
            MemberRef,
            SerialError,
            SerializeContext,
        },
        symbols::{DispatchKind, SymbolTable},
        tree::{
            BinaryOperator,
            CatchBlock,
            DynamicOperation,
            Expr,
            MemberBinding,
            SwitchCase,
            TypeBinaryOperator,
            UnaryOperator,
        },
    };

    fn round_trip(expr: &Expr) -> Expr {
        let text = Document::serialize(expr).unwrap().to_json().unwrap();

        Document::from_json(&text).unwrap().deserialize().unwrap()
    }

    #[test]
    fn test_reduced_program_round_trip() {
        let table = SymbolTable::new(vec![SymbolTable::root().clone()]);

        // (let square (fn [(n Int32)] (* n n)) (square 5))
        let program = Expr::list(vec![
            Expr::ident("let"),
            Expr::ident("square"),
            Expr::list(vec![
                Expr::ident("fn"),
                Expr::vector(vec![Expr::list(vec![Expr::ident("n"), Expr::ident("Int32")])]),
                Expr::list(vec![Expr::ident("*"), Expr::ident("n"), Expr::ident("n")]),
            ]),
            Expr::list(vec![Expr::ident("square"), Expr::constant(5)]),
        ]);

        let reduced = program.reduce_value(&table, None).unwrap();
        let restored = round_trip(&reduced);

        assert_eq!(restored.to_string(), reduced.to_string());
        assert_eq!(restored.evaluate().unwrap(), Value::I32(25));
    }

    #[test]
    fn test_unreduced_tree_round_trip() {
        let parameter = Expr::ambiguous_parameter("x", None);

        let program = Expr::list(vec![
            Expr::ident("twice"),
            Expr::macro_expr(
                vec![parameter.clone()],
                Expr::list(vec![Expr::ident("+"), parameter.clone(), parameter]),
            )
            .unwrap(),
            Expr::vector(vec![Expr::constant("ab"), Expr::type_candidate(TypeMeta::string())]),
        ]);

        let document = Document::serialize(&program).unwrap();

        assert_eq!(document.parameters.len(), 1);
        assert_eq!(document.types.len(), 1);

        assert_eq!(round_trip(&program).to_string(), program.to_string());
    }

    #[test]
    fn test_node_kinds_round_trip() {
        let table = SymbolTable::new(vec![SymbolTable::root().clone()]);

        let assembly = Domain::get().define_assembly("serial_kind_tests", Version::new(1, 0, 0));

        let point = assembly.build_type("Point").namespace("Geometry").build();
        let x = point.define_field("X", TypeMeta::int32(), false);

        let _ = point.define_method(MethodDecl::constructor(move |_| Ok(Value::new_object(point))));

        let less = Expr::binary(BinaryOperator::LessThan, Expr::constant(1), Expr::constant(2)).unwrap();

        let n = Expr::parameter("n", TypeMeta::int32());
        let square = Expr::lambda(
            vec![n.clone()],
            Expr::binary(BinaryOperator::Multiply, n.clone(), n).unwrap(),
        )
        .unwrap();

        let error = Expr::parameter("error", TypeMeta::object());
        let counter = Expr::parameter("counter", TypeMeta::int32());
        let m = Expr::ambiguous_parameter("m", Some(TypeMeta::int32()));

        let cases = vec![
            (
                "Conditional",
                Expr::condition(less.clone(), Expr::constant("yes"), Expr::constant(Value::Nil)).unwrap(),
            ),
            (
                "typed Conditional",
                Expr::condition_typed(less, Expr::constant("a"), Expr::constant("b"), TypeMeta::object())
                    .unwrap(),
            ),
            (
                "Switch",
                Expr::switch(
                    Expr::constant(2),
                    vec![
                        SwitchCase {
                            tests: vec![Expr::constant(1)],
                            body: Expr::constant("one"),
                        },
                        SwitchCase {
                            tests: vec![Expr::constant(2), Expr::constant(3)],
                            body: Expr::constant("few"),
                        },
                    ],
                    Some(Expr::constant("many")),
                )
                .unwrap(),
            ),
            (
                "Try",
                Expr::try_catch(
                    Expr::block(
                        Vec::new(),
                        vec![Expr::throw(Expr::constant(42)).unwrap(), Expr::constant(0)],
                    )
                    .unwrap(),
                    vec![CatchBlock {
                        test: TypeMeta::object(),
                        variable: Some(error.clone()),
                        filter: None,
                        body: Expr::convert(error, TypeMeta::int32()).unwrap(),
                    }],
                    Some(Expr::default(TypeMeta::void())),
                    None,
                )
                .unwrap(),
            ),
            (
                "Dynamic",
                Expr::dynamic(
                    DynamicOperation::Binary {
                        operator: BinaryOperator::Add,
                    },
                    vec![Expr::constant(1), Expr::constant(0.5)],
                )
                .unwrap(),
            ),
            (
                "TypeBinary",
                Expr::type_binary(
                    TypeBinaryOperator::TypeIs,
                    Expr::typed_constant("text", TypeMeta::object()).unwrap(),
                    TypeMeta::string(),
                )
                .unwrap(),
            ),
            (
                "TypeAs",
                Expr::unary_typed(
                    UnaryOperator::TypeAs,
                    Expr::typed_constant("text", TypeMeta::object()).unwrap(),
                    TypeMeta::string(),
                )
                .unwrap(),
            ),
            ("Default", Expr::default(TypeMeta::int64())),
            ("Invoke", Expr::invoke(square, vec![Expr::constant(7)]).unwrap()),
            (
                "NewArrayBounds",
                Expr::new_array_bounds(TypeMeta::int32(), vec![Expr::constant(2), Expr::constant(3)])
                    .unwrap(),
            ),
            (
                "MemberInit",
                Expr::member(
                    Some(
                        Expr::member_init(
                            Expr::new(point.constructors()[0], Vec::new()).unwrap(),
                            vec![MemberBinding {
                                member: MemberMeta::Field(x),
                                value: Expr::constant(5),
                            }],
                        )
                        .unwrap(),
                    ),
                    MemberMeta::Field(x),
                )
                .unwrap(),
            ),
            (
                "RuntimeVariables",
                Expr::block(
                    vec![counter.clone()],
                    vec![
                        Expr::assign(counter.clone(), Expr::constant(5)).unwrap(),
                        Expr::runtime_variables(vec![counter]).unwrap(),
                    ],
                )
                .unwrap(),
            ),
            (
                "DebugInfo",
                Expr::block(
                    Vec::new(),
                    vec![
                        Expr::debug_info("main.lisp", (1, 1), (1, 5)).unwrap(),
                        Expr::constant(1),
                    ],
                )
                .unwrap(),
            ),
            (
                "AmbiguousLambda",
                Expr::list(vec![
                    Expr::ambiguous_lambda(
                        vec![m],
                        Expr::list(vec![Expr::ident("*"), Expr::ident("m"), Expr::ident("m")]),
                        None,
                    )
                    .unwrap(),
                    Expr::constant(6),
                ]),
            ),
            (
                "Dispatch",
                Expr::dispatch(
                    DispatchKind::METHOD,
                    None,
                    "+",
                    Vec::new(),
                    vec![Expr::constant(1), Expr::constant(2)],
                ),
            ),
        ];

        for (name, expr) in cases {
            let restored = round_trip(&expr);

            assert_eq!(restored.to_string(), expr.to_string(), "{name} display");

            let expected = expr.reduce_value(&table, None).unwrap().evaluate().unwrap();
            let actual = restored.reduce_value(&table, None).unwrap().evaluate().unwrap();

            assert_eq!(actual.to_string(), expected.to_string(), "{name} value");
        }
    }

    #[test]
    fn test_non_finite_constants() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.0, 0.0, 1.5] {
            let restored = round_trip(&Expr::constant(value)).evaluate().unwrap();

            let Value::F64(restored) = restored else {
                panic!("unexpected value {restored}");
            };

            assert_eq!(restored.to_bits(), value.to_bits());
        }

        let text = Document::serialize(&Expr::constant(f64::NEG_INFINITY))
            .unwrap()
            .to_json()
            .unwrap();

        assert!(text.contains("\"-Infinity\""));

        assert!(serde_json::from_str::<ConstantValue>(r#"{"kind": "F64", "value": "Huge"}"#).is_err());
        assert_eq!(
            serde_json::from_str::<ConstantValue>(r#"{"kind": "F64", "value": 2}"#).unwrap(),
            ConstantValue::F64(2.0),
        );
    }

    #[test]
    fn test_reference_identity() {
        let mut context = SerializeContext::new();

        let int32 = context.ty(TypeMeta::int32()).unwrap();

        assert_eq!(context.ty(TypeMeta::string()).unwrap(), int32 + 1);
        assert_eq!(context.ty(TypeMeta::int32()).unwrap(), int32);

        let one = context.constant(&Value::I32(1), TypeMeta::int32()).unwrap();

        assert_eq!(context.constant(&Value::I32(1), TypeMeta::int32()).unwrap(), one);
        assert_ne!(context.constant(&Value::I32(1), TypeMeta::object()).unwrap(), one);

        let zero = context.constant(&Value::F64(0.0), TypeMeta::double()).unwrap();

        assert_ne!(context.constant(&Value::F64(-0.0), TypeMeta::double()).unwrap(), zero);

        let x = Expr::parameter("x", TypeMeta::int32());
        let sum = Expr::binary(BinaryOperator::Add, x.clone(), x.clone()).unwrap();
        let lambda = Expr::lambda(vec![x], sum).unwrap();

        let document = Document::serialize(&lambda).unwrap();

        assert_eq!(document.parameters.len(), 1);

        let restored = document.deserialize().unwrap();
        let function = restored.evaluate().unwrap();

        assert_eq!(
            function.as_function().unwrap().call(&[Value::I32(4)]).unwrap(),
            Value::I32(8),
        );
    }

    #[test]
    fn test_generic_method_reference() {
        let assembly = Domain::get().define_assembly("serial_generic_tests", Version::new(1, 0, 0));

        let helpers = assembly.build_type("Helpers").namespace("Serial").build();

        let mut declaration = MethodDecl::function("Identity", |call| Ok(call.argument(0).clone()));

        let t = declaration.generic(&["T"])[0];

        let identity = helpers.define_method(declaration.parameter("value", t).returns(t));

        let call = Expr::call(
            None,
            identity.make_generic(&[TypeMeta::int64()]).unwrap(),
            vec![Expr::constant(7i64)],
        )
        .unwrap();

        let document = Document::serialize(&call).unwrap();

        let [MemberRef::Method(method)] = document.members.as_slice() else {
            panic!("unexpected member table {:?}", document.members);
        };

        assert_eq!(method.signature, "T Identity[T](T)");
        assert_eq!(method.type_arguments.len(), 1);

        let restored = round_trip(&call);

        assert_eq!(restored.ty(), Some(TypeMeta::int64()));
        assert_eq!(restored.evaluate().unwrap(), Value::I64(7));
    }

    #[test]
    fn test_overload_disambiguation() {
        let assembly = Domain::get().define_assembly("serial_overload_tests", Version::new(1, 0, 0));

        let picker = assembly.build_type("Picker").build();

        let first = picker.define_method(
            MethodDecl::function("Pick", |_| Ok(Value::I32(1)))
                .parameter("value", TypeMeta::int32())
                .returns(TypeMeta::int32()),
        );

        let _ = picker.define_method(
            MethodDecl::function("Pick", |_| Ok(Value::I32(2)))
                .parameter("value", TypeMeta::int32())
                .returns(TypeMeta::int32()),
        );

        let call = Expr::call(None, first, vec![Expr::constant(0)]).unwrap();

        let document = Document::serialize(&call).unwrap();

        assert!(matches!(
            document.deserialize(),
            Err(SerialError::AmbiguousMatch { candidates: 2, .. }),
        ));

        let restored = document
            .deserialize_with(DeserializeConfig {
                lenient_overloads: true,
            })
            .unwrap();

        assert_eq!(restored.evaluate().unwrap(), Value::I32(1));
    }

    #[test]
    fn test_resolution_failures() {
        let parameter = Expr::parameter("x", TypeMeta::int32());

        let mut document = Document::serialize(&parameter).unwrap();

        document.assemblies[0].version = Version::new(2, 0, 0);

        assert!(matches!(
            document.deserialize(),
            Err(SerialError::AssemblyVersion { .. }),
        ));

        document.assemblies[0].name = "missing_assembly".into();

        assert!(matches!(
            document.deserialize(),
            Err(SerialError::AssemblyLoad { .. }),
        ));

        let mut document = Document::serialize(&parameter).unwrap();

        document.types[0].name = "Missing".into();

        assert!(matches!(
            document.deserialize(),
            Err(SerialError::MemberResolution { .. }),
        ));

        document.types[0].name = "Box`1[".into();

        assert!(matches!(
            document.deserialize(),
            Err(SerialError::Signature { .. }),
        ));
    }

    #[test]
    fn test_unsupported_documents() {
        assert!(matches!(
            Document::serialize(&Expr::module(SymbolTable::new(Vec::new()))),
            Err(SerialError::UnsupportedNodeKind { kind: "Module" }),
        ));

        let mut document = Document::serialize(&Expr::constant(1)).unwrap();

        document.version = 99;

        let text = document.to_json().unwrap();

        assert!(matches!(
            Document::from_json(&text),
            Err(SerialError::UnsupportedVersion { found: 99, .. }),
        ));

        assert!(matches!(
            Document::from_json("{\"version\": 1}"),
            Err(SerialError::Json { .. }),
        ));
    }
}
