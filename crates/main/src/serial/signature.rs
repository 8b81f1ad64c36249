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

use std::fmt::{Debug, Display, Formatter, Write};

use compact_str::CompactString;
use lady_deirdre::lexis::{SourceCode, Token, TokenBuffer};

use crate::{
    runtime::write_escaped,
    serial::{SerialError, SerialResult},
};

/// A lexeme of the canonical type name and method signature grammar.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Token)]
#[repr(u8)]
#[non_exhaustive]
pub enum SignatureToken {
    EOI = 0,

    Unknown = 1,

    #[rule('`')]
    Backtick,

    #[rule('[')]
    BracketOpen,

    #[rule(']')]
    BracketClose,

    #[rule('(')]
    ParenOpen,

    #[rule(')')]
    ParenClose,

    #[rule('+')]
    Plus,

    #[rule('.')]
    Dot,

    #[rule(',')]
    Comma,

    #[rule('*')]
    Star,

    #[rule('&')]
    Amp,

    #[rule('\\' .)]
    #[describe("escape")]
    Escaped,

    #[rule([
        'a'..'z', 'A'..'Z', '0'..'9', '_', '$', '<', '>', '-', '@', '#', '!', '?',
        '=', '~', '|', '^', '%', '/', ':', ';', '{', '}'
    ]+)]
    #[describe("name")]
    Word,

    #[rule([' ', '\t']+)]
    #[describe("blank")]
    Whitespace,
}

impl Default for SignatureToken {
    #[inline(always)]
    fn default() -> Self {
        Self::Unknown
    }
}

/// A parsed canonical type name, such as ``Geometry.Box`1[Int32][]``.
///
/// The [Display] implementation renders the name back in the canonical
/// form, so a name rendered by [TypeMeta::full_name](crate::runtime::TypeMeta::full_name)
/// survives the parse-and-render cycle unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct TypeName {
    /// The escaped name of the type definition, including the namespace,
    /// the declaring types and the generic arity suffix.
    pub definition: CompactString,

    /// The generic arity of the innermost definition.
    pub arity: usize,

    /// The type arguments of a constructed generic type.
    pub arguments: Vec<TypeArgument>,

    pub suffixes: Vec<TypeSuffix>,
}

impl Debug for TypeName {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for TypeName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.definition)?;

        if !self.arguments.is_empty() {
            formatter.write_char('[')?;

            for (index, argument) in self.arguments.iter().enumerate() {
                if index > 0 {
                    formatter.write_char(',')?;
                }

                match &argument.assembly {
                    None => Display::fmt(&argument.ty, formatter)?,

                    Some(assembly) => {
                        let mut escaped = String::new();

                        write_escaped(&mut escaped, assembly);

                        formatter.write_fmt(format_args!("[{}, {escaped}]", argument.ty))?;
                    }
                }
            }

            formatter.write_char(']')?;
        }

        for suffix in &self.suffixes {
            match suffix {
                TypeSuffix::Pointer => formatter.write_char('*')?,
                TypeSuffix::ByRef => formatter.write_char('&')?,

                TypeSuffix::Array(rank) => {
                    formatter.write_char('[')?;

                    for _ in 1..*rank {
                        formatter.write_char(',')?;
                    }

                    formatter.write_char(']')?;
                }
            }
        }

        Ok(())
    }
}

impl TypeName {
    /// Parses a canonical type name.
    pub fn parse(text: &str) -> SerialResult<Self> {
        let buffer = TokenBuffer::<SignatureToken>::from(text);
        let mut parser = Parser::new(text, &buffer);

        let name = parser.type_name()?;

        parser.finish()?;

        Ok(name)
    }
}

/// A type argument of a constructed generic type name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeArgument {
    pub ty: TypeName,

    /// The assembly of the argument type. None for the core types and for
    /// generic parameters.
    pub assembly: Option<CompactString>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeSuffix {
    Pointer,
    ByRef,

    /// An array of the specified rank.
    Array(usize),
}

/// A parsed method signature in the form
/// `ReturnType Name[TypeParameters](ParameterTypes)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSignature {
    pub ret: TypeName,
    pub name: CompactString,
    pub generics: Vec<TypeName>,
    pub parameters: Vec<TypeName>,
}

impl MethodSignature {
    /// Parses a method signature as rendered by
    /// [MethodMeta::signature](crate::runtime::MethodMeta::signature).
    pub fn parse(text: &str) -> SerialResult<Self> {
        let buffer = TokenBuffer::<SignatureToken>::from(text);
        let mut parser = Parser::new(text, &buffer);

        let ret = parser.type_name()?;

        if !parser.skip_blanks() {
            return Err(parser.error("expected blank after return type"));
        }

        let name = parser.method_name()?;

        let mut generics = Vec::new();

        if parser.eat(SignatureToken::BracketOpen) {
            loop {
                generics.push(parser.type_name()?);

                if !parser.eat(SignatureToken::Comma) {
                    break;
                }
            }

            parser.expect(SignatureToken::BracketClose, "expected ']'")?;
        }

        parser.expect(SignatureToken::ParenOpen, "expected '('")?;

        let mut parameters = Vec::new();

        if !parser.eat(SignatureToken::ParenClose) {
            loop {
                let _ = parser.skip_blanks();

                parameters.push(parser.type_name()?);

                let _ = parser.skip_blanks();

                if !parser.eat(SignatureToken::Comma) {
                    break;
                }
            }

            parser.expect(SignatureToken::ParenClose, "expected ')'")?;
        }

        parser.finish()?;

        Ok(Self {
            ret,
            name,
            generics,
            parameters,
        })
    }

    /// The number of the generic parameters of the method.
    #[inline(always)]
    pub fn arity(&self) -> usize {
        self.generics.len()
    }
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(SignatureToken, &'a str)>,
    cursor: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, buffer: &'a TokenBuffer<SignatureToken>) -> Self {
        let tokens = buffer
            .chunks(..)
            .filter(|chunk| chunk.token != SignatureToken::EOI)
            .map(|chunk| (chunk.token, chunk.string))
            .collect();

        Self {
            text,
            tokens,
            cursor: 0,
        }
    }

    fn type_name(&mut self) -> SerialResult<TypeName> {
        let mut definition = String::new();
        let mut arity = 0;

        loop {
            let segment = self.name()?;

            write_escaped(&mut definition, &segment);

            arity = 0;

            if self.eat(SignatureToken::Backtick) {
                let digits = self.name()?;

                arity = match digits.parse::<usize>() {
                    Ok(arity) => arity,
                    Err(_) => return Err(self.error("expected generic arity")),
                };

                let _ = definition.write_fmt(format_args!("`{arity}"));
            }

            if self.eat(SignatureToken::Dot) {
                definition.push('.');
                continue;
            }

            if self.eat(SignatureToken::Plus) {
                definition.push('+');
                continue;
            }

            break;
        }

        let mut arguments = Vec::new();

        if self.peek() == Some(SignatureToken::BracketOpen) && !self.is_array_suffix() {
            self.cursor += 1;

            loop {
                arguments.push(self.argument()?);

                if !self.eat(SignatureToken::Comma) {
                    break;
                }
            }

            self.expect(SignatureToken::BracketClose, "expected ']'")?;
        }

        let mut suffixes = Vec::new();

        loop {
            match self.peek() {
                Some(SignatureToken::Star) => {
                    self.cursor += 1;
                    suffixes.push(TypeSuffix::Pointer);
                }

                Some(SignatureToken::Amp) => {
                    self.cursor += 1;
                    suffixes.push(TypeSuffix::ByRef);
                }

                Some(SignatureToken::BracketOpen) if self.is_array_suffix() => {
                    self.cursor += 1;

                    let mut rank = 1;

                    while self.eat(SignatureToken::Comma) {
                        rank += 1;
                    }

                    self.expect(SignatureToken::BracketClose, "expected ']'")?;

                    suffixes.push(TypeSuffix::Array(rank));
                }

                _ => break,
            }
        }

        Ok(TypeName {
            definition: CompactString::from(definition),
            arity,
            arguments,
            suffixes,
        })
    }

    fn argument(&mut self) -> SerialResult<TypeArgument> {
        if !self.eat(SignatureToken::BracketOpen) {
            return Ok(TypeArgument {
                ty: self.type_name()?,
                assembly: None,
            });
        }

        let ty = self.type_name()?;

        self.expect(SignatureToken::Comma, "expected ',' before assembly name")?;

        let _ = self.skip_blanks();

        let assembly = self.name()?;

        self.expect(SignatureToken::BracketClose, "expected ']'")?;

        Ok(TypeArgument {
            ty,
            assembly: Some(assembly),
        })
    }

    // A raw name segment: words, escaped characters and unrecognized
    // characters up to the next punctuation.
    fn name(&mut self) -> SerialResult<CompactString> {
        let mut name = CompactString::default();

        while let Some((token, string)) = self.tokens.get(self.cursor) {
            match token {
                SignatureToken::Word | SignatureToken::Unknown => name.push_str(string),
                SignatureToken::Escaped => name.push_str(&string[1..]),
                _ => break,
            }

            self.cursor += 1;
        }

        if name.is_empty() {
            return Err(self.error("expected name"));
        }

        Ok(name)
    }

    // Method names may contain dots (`.ctor`), so the name extends up to
    // the type parameters or the parameter list.
    fn method_name(&mut self) -> SerialResult<CompactString> {
        let mut name = CompactString::default();

        while let Some((token, string)) = self.tokens.get(self.cursor) {
            match token {
                SignatureToken::BracketOpen | SignatureToken::ParenOpen => break,
                SignatureToken::Escaped => name.push_str(&string[1..]),
                _ => name.push_str(string),
            }

            self.cursor += 1;
        }

        if name.is_empty() {
            return Err(self.error("expected method name"));
        }

        Ok(name)
    }

    // An opening bracket followed by a closing bracket or a comma starts an
    // array suffix rather than a type argument list.
    #[inline(always)]
    fn is_array_suffix(&self) -> bool {
        matches!(
            self.tokens.get(self.cursor + 1),
            Some((SignatureToken::BracketClose | SignatureToken::Comma, _)),
        )
    }

    #[inline(always)]
    fn peek(&self) -> Option<SignatureToken> {
        self.tokens.get(self.cursor).map(|(token, _)| *token)
    }

    #[inline(always)]
    fn eat(&mut self, token: SignatureToken) -> bool {
        if self.peek() != Some(token) {
            return false;
        }

        self.cursor += 1;

        true
    }

    fn skip_blanks(&mut self) -> bool {
        let mut skipped = false;

        while self.eat(SignatureToken::Whitespace) {
            skipped = true;
        }

        skipped
    }

    fn expect(&mut self, token: SignatureToken, message: &'static str) -> SerialResult<()> {
        match self.eat(token) {
            true => Ok(()),
            false => Err(self.error(message)),
        }
    }

    fn finish(&mut self) -> SerialResult<()> {
        let _ = self.skip_blanks();

        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("unexpected trailing input")),
        }
    }

    fn error(&self, message: &'static str) -> SerialError {
        let position = self.tokens[..self.cursor.min(self.tokens.len())]
            .iter()
            .map(|(_, string)| string.len())
            .sum();

        SerialError::Signature {
            text: CompactString::new(self.text),
            position,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use lady_deirdre::lexis::Token;
    use semver::Version;

    use crate::{
        runtime::{Domain, TypeMeta},
        serial::{
            signature::{MethodSignature, SignatureToken, TypeName, TypeSuffix},
            SerialError,
        },
    };

    #[test]
    fn test_token_descriptions() {
        assert_eq!(
            "Backtick",
            <SignatureToken as Token>::rule_name(SignatureToken::Backtick as u8).unwrap(),
        );

        assert_eq!(
            "name",
            <SignatureToken as Token>::rule_description(SignatureToken::Word as u8, false).unwrap(),
        );
    }

    #[test]
    fn test_type_name_rendering() {
        for text in [
            "Int32",
            "Geometry.Outer+Inner",
            "Fn`3[Int32,String,Double]",
            "Box`1[[Geometry.Point, geometry]]",
            "Int32[,]",
            "Int32*&",
            "List`1[Int32][][]",
            "Odd\\.Name\\ Here",
        ] {
            assert_eq!(TypeName::parse(text).unwrap().to_string(), text);
        }

        let name = TypeName::parse("Box`1[[Geometry.Point, geometry]][,]").unwrap();

        assert_eq!(name.definition, "Box`1");
        assert_eq!(name.arity, 1);
        assert_eq!(name.arguments[0].ty.definition, "Geometry.Point");
        assert_eq!(name.arguments[0].assembly.as_deref(), Some("geometry"));
        assert_eq!(name.suffixes, vec![TypeSuffix::Array(2)]);
    }

    #[test]
    fn test_full_names_parse() {
        let assembly = Domain::get().define_assembly("signature_tests", Version::new(1, 0, 0));

        let point = assembly.build_type("Point").namespace("Geometry").build();
        let pair = assembly.build_type("Pair").generic(&["A", "B"]).build();

        let constructed = pair.make_generic(&[point, TypeMeta::string()]).unwrap().array(2);

        let full_name = constructed.full_name();

        assert_eq!(full_name, "Pair`2[[Geometry.Point, signature_tests],String][,]");
        assert_eq!(TypeName::parse(&full_name).unwrap().to_string(), full_name);
    }

    #[test]
    fn test_method_signatures() {
        let signature = MethodSignature::parse("Box`1[T] Wrap[T](T)").unwrap();

        assert_eq!(signature.ret.to_string(), "Box`1[T]");
        assert_eq!(signature.name, "Wrap");
        assert_eq!(signature.arity(), 1);
        assert_eq!(signature.parameters.len(), 1);

        let signature = MethodSignature::parse("Void .ctor(String, Int32[])").unwrap();

        assert_eq!(signature.name, ".ctor");
        assert_eq!(signature.arity(), 0);
        assert_eq!(
            signature
                .parameters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec!["String", "Int32[]"],
        );

        let signature = MethodSignature::parse("Int32 Count()").unwrap();

        assert!(signature.parameters.is_empty());
    }

    #[test]
    fn test_malformed_names() {
        assert!(matches!(
            TypeName::parse("Box`1["),
            Err(SerialError::Signature { .. }),
        ));

        assert!(matches!(
            TypeName::parse("Int32 Int64"),
            Err(SerialError::Signature { .. }),
        ));

        assert!(matches!(
            MethodSignature::parse("Int32Count()"),
            Err(SerialError::Signature { .. }),
        ));
    }
}
