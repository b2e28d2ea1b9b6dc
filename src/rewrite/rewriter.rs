use std::ops::{Add, AddAssign};

use crate::{
    metadata::{
        access::{MemberAccess, TypeVisibility},
        method::MethodBody,
        typedef::TypeDef,
    },
    rewrite::Policy,
};

/// What a rewrite changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    /// Types whose visibility was widened
    pub types: usize,
    /// Fields whose access was widened
    pub fields: usize,
    /// Methods whose access was widened
    pub methods: usize,
    /// Method bodies replaced by the throwing stub
    pub stubbed: usize,
    /// Types left alone because the allow-list excludes them
    pub skipped: usize,
}

impl RewriteStats {
    /// Sums two sets of counters.
    #[must_use]
    pub fn merge(self, other: RewriteStats) -> RewriteStats {
        RewriteStats {
            types: self.types + other.types,
            fields: self.fields + other.fields,
            methods: self.methods + other.methods,
            stubbed: self.stubbed + other.stubbed,
            skipped: self.skipped + other.skipped,
        }
    }

    /// `true` if nothing was changed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.types == 0 && self.fields == 0 && self.methods == 0 && self.stubbed == 0
    }
}

impl Add for RewriteStats {
    type Output = RewriteStats;

    fn add(self, rhs: RewriteStats) -> RewriteStats {
        self.merge(rhs)
    }
}

impl AddAssign for RewriteStats {
    fn add_assign(&mut self, rhs: RewriteStats) {
        *self = self.merge(rhs);
    }
}

/// Applies a [`Policy`] to individual types.
///
/// A rewrite only touches the type it is given, its fields and its methods. Distinct types
/// of the same module can therefore be rewritten from different threads at once.
#[derive(Debug, Clone, Copy)]
pub struct Rewriter<'p> {
    policy: &'p Policy,
}

impl<'p> Rewriter<'p> {
    /// A rewriter applying `policy`.
    #[must_use]
    pub fn new(policy: &'p Policy) -> Self {
        Rewriter { policy }
    }

    /// Rewrites `ty` in place.
    pub fn rewrite(&self, ty: &mut TypeDef) -> RewriteStats {
        let mut stats = RewriteStats::default();
        if !self.policy.includes(&ty.full_name) {
            stats.skipped = 1;
            return stats;
        }

        if let Some(visibility) = widen_type(ty.is_nested(), ty.visibility) {
            ty.visibility = visibility;
            stats.types += 1;
        }

        for field in &mut ty.fields {
            if let Some(access) = widen_member(field.access) {
                field.access = access;
                stats.fields += 1;
            }
        }

        for method in &mut ty.methods {
            if self.policy.stub_bodies && method.has_il_body() {
                method.body = Some(MethodBody::throw_stub());
                stats.stubbed += 1;
            }

            if let Some(access) = widen_member(method.access) {
                method.access = access;
                stats.methods += 1;
            }
        }

        stats
    }
}

/// The visibility a type receives, `None` if it keeps its own.
///
/// Top-level types only ever move from `NotPublic` to `Public`; nested types only from the
/// three assembly-scoped values to `NestedPublic`.
fn widen_type(nested: bool, visibility: TypeVisibility) -> Option<TypeVisibility> {
    match (nested, visibility) {
        (false, TypeVisibility::NotPublic) => Some(TypeVisibility::Public),
        (
            true,
            TypeVisibility::NestedAssembly
            | TypeVisibility::NestedFamOrAssem
            | TypeVisibility::NestedFamAndAssem,
        ) => Some(TypeVisibility::NestedPublic),
        (
            false,
            TypeVisibility::Public
            | TypeVisibility::NestedPublic
            | TypeVisibility::NestedPrivate
            | TypeVisibility::NestedFamily
            | TypeVisibility::NestedAssembly
            | TypeVisibility::NestedFamAndAssem
            | TypeVisibility::NestedFamOrAssem,
        )
        | (
            true,
            TypeVisibility::NotPublic
            | TypeVisibility::Public
            | TypeVisibility::NestedPublic
            | TypeVisibility::NestedPrivate
            | TypeVisibility::NestedFamily,
        ) => None,
    }
}

/// The access a field or method receives, `None` if it keeps its own.
fn widen_member(access: MemberAccess) -> Option<MemberAccess> {
    match access {
        MemberAccess::Assembly | MemberAccess::FamOrAssem | MemberAccess::FamAndAssem => {
            Some(MemberAccess::Public)
        }
        MemberAccess::CompilerControlled
        | MemberAccess::Private
        | MemberAccess::Family
        | MemberAccess::Public => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        field::FieldDef,
        method::{MethodBody, MethodDef, MethodModifiers},
        tables::TableId,
        token::Token,
        typedef::top_level_name,
    };
    use strum::IntoEnumIterator;

    fn field(rid: u32, access: MemberAccess) -> FieldDef {
        FieldDef {
            rid,
            token: Token::from_parts(TableId::Field, rid),
            name: format!("f{rid}"),
            access,
            flags: access.bits(),
        }
    }

    fn method(rid: u32, access: MemberAccess, rva: u32, modifiers: MethodModifiers) -> MethodDef {
        MethodDef {
            rid,
            token: Token::from_parts(TableId::MethodDef, rid),
            name: format!("m{rid}"),
            access,
            modifiers,
            flags: access.bits() | modifiers.bits(),
            impl_flags: 0,
            rva,
            body: None,
        }
    }

    fn ty(namespace: &str, name: &str, visibility: TypeVisibility, nested: bool) -> TypeDef {
        TypeDef {
            rid: 2,
            token: Token::from_parts(TableId::TypeDef, 2),
            namespace: namespace.to_string(),
            name: name.to_string(),
            full_name: top_level_name(namespace, name),
            visibility,
            flags: visibility.bits(),
            fields: Vec::new(),
            methods: Vec::new(),
            enclosing: nested.then_some(0),
            nested: Vec::new(),
        }
    }

    #[test]
    fn top_level_rule() {
        for visibility in TypeVisibility::iter() {
            let expected = match visibility {
                TypeVisibility::NotPublic => Some(TypeVisibility::Public),
                _ => None,
            };
            assert_eq!(widen_type(false, visibility), expected, "{visibility}");
        }
    }

    #[test]
    fn nested_rule() {
        let expected = [
            (TypeVisibility::NotPublic, None),
            (TypeVisibility::Public, None),
            (TypeVisibility::NestedPublic, None),
            (TypeVisibility::NestedPrivate, None),
            (TypeVisibility::NestedFamily, None),
            (
                TypeVisibility::NestedAssembly,
                Some(TypeVisibility::NestedPublic),
            ),
            (
                TypeVisibility::NestedFamAndAssem,
                Some(TypeVisibility::NestedPublic),
            ),
            (
                TypeVisibility::NestedFamOrAssem,
                Some(TypeVisibility::NestedPublic),
            ),
        ];
        for (before, after) in expected {
            assert_eq!(widen_type(true, before), after, "{before}");
        }
    }

    #[test]
    fn widening_is_monotonic() {
        fn rank(access: MemberAccess) -> u8 {
            match access {
                MemberAccess::CompilerControlled => 0,
                MemberAccess::Private => 1,
                MemberAccess::FamAndAssem => 2,
                MemberAccess::Assembly | MemberAccess::Family => 3,
                MemberAccess::FamOrAssem => 4,
                MemberAccess::Public => 5,
            }
        }

        for access in MemberAccess::iter() {
            if let Some(widened) = widen_member(access) {
                assert!(rank(widened) > rank(access), "{access}");
            }
        }
    }

    #[test]
    fn rewrite_members() {
        let mut bar = ty("Foo", "Bar", TypeVisibility::NotPublic, false);
        bar.fields = vec![
            field(1, MemberAccess::Assembly),
            field(2, MemberAccess::Private),
            field(3, MemberAccess::Family),
            field(4, MemberAccess::FamAndAssem),
        ];
        bar.methods = vec![
            method(1, MemberAccess::Assembly, 0x2050, MethodModifiers::empty()),
            method(2, MemberAccess::Private, 0x2060, MethodModifiers::empty()),
            method(3, MemberAccess::FamOrAssem, 0, MethodModifiers::ABSTRACT),
        ];

        let policy = Policy::new();
        let stats = Rewriter::new(&policy).rewrite(&mut bar);

        assert_eq!(bar.visibility, TypeVisibility::Public);
        assert_eq!(bar.fields[0].access, MemberAccess::Public);
        assert_eq!(bar.fields[1].access, MemberAccess::Private);
        assert_eq!(bar.fields[2].access, MemberAccess::Family);
        assert_eq!(bar.fields[3].access, MemberAccess::Public);
        assert_eq!(bar.methods[0].access, MemberAccess::Public);
        assert_eq!(bar.methods[1].access, MemberAccess::Private);
        assert_eq!(bar.methods[2].access, MemberAccess::Public);

        // Private methods are stubbed too, abstract ones have nothing to stub
        assert!(bar.methods[0].has_replaced_body());
        assert!(bar.methods[1].has_replaced_body());
        assert!(bar.methods[2].body.is_none());

        assert_eq!(
            stats,
            RewriteStats {
                types: 1,
                fields: 2,
                methods: 2,
                stubbed: 2,
                skipped: 0,
            }
        );
    }

    #[test]
    fn keep_bodies() {
        let mut bar = ty("Foo", "Bar", TypeVisibility::NotPublic, false);
        bar.methods = vec![method(1, MemberAccess::Assembly, 0x2050, MethodModifiers::empty())];

        let policy = Policy::new().with_stub_bodies(false);
        let stats = Rewriter::new(&policy).rewrite(&mut bar);

        assert!(bar.methods[0].body.is_none());
        assert_eq!(bar.methods[0].access, MemberAccess::Public);
        assert_eq!(stats.stubbed, 0);
    }

    #[test]
    fn allow_list_skips() {
        let mut bar = ty("Foo", "Bar", TypeVisibility::NotPublic, false);
        bar.methods = vec![method(1, MemberAccess::Assembly, 0x2050, MethodModifiers::empty())];

        let policy = Policy::new().with_allowed_type("Foo.Other");
        let stats = Rewriter::new(&policy).rewrite(&mut bar);

        assert_eq!(bar.visibility, TypeVisibility::NotPublic);
        assert_eq!(bar.methods[0].access, MemberAccess::Assembly);
        assert!(bar.methods[0].body.is_none());
        assert_eq!(stats.skipped, 1);
        assert!(stats.is_unchanged());
    }

    #[test]
    fn nested_private_is_preserved() {
        let mut inner = ty("", "Inner", TypeVisibility::NestedPrivate, true);
        inner.full_name = "Foo.Bar/Inner".to_string();

        let policy = Policy::new().with_allowed_type("Foo.Bar/Inner");
        Rewriter::new(&policy).rewrite(&mut inner);
        assert_eq!(inner.visibility, TypeVisibility::NestedPrivate);
    }

    #[test]
    fn stub_body_shape() {
        let mut bar = ty("Foo", "Bar", TypeVisibility::Public, false);
        bar.methods = vec![method(1, MemberAccess::Public, 0x2050, MethodModifiers::empty())];

        let policy = Policy::new();
        Rewriter::new(&policy).rewrite(&mut bar);

        let body: &MethodBody = bar.methods[0].body.as_ref().unwrap();
        let mnemonics: Vec<_> = body.instructions.iter().map(|i| i.mnemonic).collect();
        assert_eq!(mnemonics, vec!["ldnull", "throw"]);
        assert!(body.exception_handlers.is_empty());
    }

    #[test]
    fn stats_merge() {
        let a = RewriteStats {
            types: 1,
            fields: 2,
            methods: 3,
            stubbed: 4,
            skipped: 5,
        };
        let mut b = a;
        b += a;
        assert_eq!(b, a + a);
        assert_eq!(b.stubbed, 8);
        assert!(RewriteStats::default().is_unchanged());
    }
}
