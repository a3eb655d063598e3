//! Rule for picking the single injection constructor of a Service.
use super::inject::{check_inject_type, InjectTypeProblem};
use crate::store::{CtorDecl, DeclaredType, Location, ParamDecl, Role, TypeDecl};
use crate::type_system::TypeContext;
use crate::validation::{Diagnostic, DiagnosticBag, DiagnosticKind};
use serde::Serialize;
use smallvec::SmallVec;

/// The constructor chosen for injection and its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstructorSelection {
    pub location: Location,
    pub params: SmallVec<[ParamDecl; 4]>,
}

/// Selects the injection constructor for a Service.
///
/// Returns `None` when selection fails or any parameter is not injectable.
/// Non-Service roles only get their misplaced `Designated` markers reported.
pub fn select_constructor(
    ctx: &TypeContext<'_>,
    decl: &TypeDecl,
    declared: &DeclaredType,
    bag: &mut DiagnosticBag,
) -> Option<ConstructorSelection> {
    if declared.role != Role::Service {
        for ctor in decl.constructors.iter().filter(|c| c.designated) {
            bag.push(Diagnostic::new(
                DiagnosticKind::DesignatedOnNonService,
                &decl.name,
                &ctor.location,
                format!("The designated-constructor marker on '{}' has no effect: its role is {}", decl.name, declared.role),
            ));
        }
        return None;
    }

    let instance_ctors: Vec<&CtorDecl> = decl.constructors.iter().filter(|c| !c.is_static).collect();
    let designated: Vec<&CtorDecl> = instance_ctors.iter().copied().filter(|c| c.designated).collect();

    let chosen = match designated.as_slice() {
        [only] => *only,
        [] => {
            let public: Vec<&CtorDecl> = instance_ctors.iter().copied().filter(|c| c.is_public).collect();
            match public.as_slice() {
                [only] => *only,
                [] => {
                    bag.push(Diagnostic::new(
                        DiagnosticKind::NoUsableConstructor,
                        &decl.name,
                        &decl.location,
                        format!("Service '{}' has no usable constructor; declare exactly one public constructor", decl.name),
                    ));
                    return None;
                }
                many => {
                    report_ambiguous(decl, many, "public constructors", bag);
                    return None;
                }
            }
        }
        many => {
            report_ambiguous(decl, many, "designated constructors", bag);
            return None;
        }
    };

    // Every parameter is checked so each invalid one is reported individually.
    let mut valid = true;
    for param in &chosen.params {
        if let Err(problem) = check_inject_type(ctx, &param.ty) {
            valid = false;
            let kind = match problem {
                InjectTypeProblem::Unknown => DiagnosticKind::UnknownType,
                _ => DiagnosticKind::InvalidConstructorParameter,
            };
            bag.push(Diagnostic::new(
                kind,
                &decl.name,
                &param.location,
                format!(
                    "Constructor parameter '{}' of '{}' has type '{}': {}",
                    param.name, decl.name, param.ty, problem
                ),
            ));
        }
    }

    valid.then(|| ConstructorSelection { location: chosen.location.clone(), params: chosen.params.clone() })
}

fn report_ambiguous(decl: &TypeDecl, candidates: &[&CtorDecl], what: &str, bag: &mut DiagnosticBag) {
    bag.push(
        Diagnostic::new(
            DiagnosticKind::AmbiguousConstructor,
            &decl.name,
            &decl.location,
            format!(
                "Service '{}' has {} {}; mark exactly one constructor as designated",
                decl.name,
                candidates.len(),
                what
            ),
        )
        .with_locations(candidates.iter().map(|c| c.location.clone())),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeclarationTable, Lifetime, ServiceMarker, Snapshot, TypeKind, TypeName};
    use crate::type_system::classify;
    use rstest::rstest;
    use smallvec::smallvec;

    fn ctor(public: bool, designated: bool, params: &[&str]) -> CtorDecl {
        CtorDecl {
            is_public: public,
            designated,
            params: params
                .iter()
                .enumerate()
                .map(|(i, ty)| ParamDecl { name: format!("p{}", i), ty: TypeName::from(*ty), location: Location::default() })
                .collect(),
            ..CtorDecl::default()
        }
    }

    fn service(ctors: Vec<CtorDecl>) -> TypeDecl {
        TypeDecl {
            service: vec![ServiceMarker { lifetime: Lifetime::Singleton, exposes: vec![] }],
            extensible: true,
            constructors: ctors,
            ..TypeDecl::new("Svc", TypeKind::Class)
        }
    }

    fn run(decl: TypeDecl) -> (Option<ConstructorSelection>, Vec<Diagnostic>) {
        let mut host = TypeDecl::new("Spawner", TypeKind::Class);
        host.host = true;
        let table = DeclarationTable::from_snapshot(&Snapshot::new(vec![
            decl,
            TypeDecl::new("IClock", TypeKind::Interface),
            TypeDecl::new("ILog", TypeKind::Interface),
            host,
        ]));

        let mut bag = DiagnosticBag::default();
        let mut ctx = TypeContext::new(&table);
        for d in table.iter() {
            let declared = classify(d, &mut bag);
            ctx.classified.insert(d.name.clone(), declared);
        }
        let decl = table.get(&"Svc".into()).unwrap();
        let declared = ctx.declared(&decl.name).unwrap().clone();
        let selection = select_constructor(&ctx, decl, &declared, &mut bag);
        (selection, bag.into_sorted())
    }

    #[rstest]
    #[case::no_constructors(vec![], Some(DiagnosticKind::NoUsableConstructor))]
    #[case::only_private(vec![ctor(false, false, &[])], Some(DiagnosticKind::NoUsableConstructor))]
    #[case::single_public(vec![ctor(true, false, &["IClock"])], None)]
    #[case::two_public(vec![ctor(true, false, &[]), ctor(true, false, &["IClock"])], Some(DiagnosticKind::AmbiguousConstructor))]
    #[case::one_designated(vec![ctor(true, false, &[]), ctor(true, true, &["ILog"]), ctor(false, false, &["IClock"])], None)]
    #[case::private_designated(vec![ctor(true, false, &[]), ctor(false, true, &["ILog"])], None)]
    #[case::two_designated(vec![ctor(true, true, &[]), ctor(true, true, &["ILog"])], Some(DiagnosticKind::AmbiguousConstructor))]
    fn test_constructor_selection(#[case] ctors: Vec<CtorDecl>, #[case] expected: Option<DiagnosticKind>) {
        let (selection, diagnostics) = run(service(ctors));
        match expected {
            None => {
                assert!(selection.is_some());
                assert!(diagnostics.is_empty(), "{:?}", diagnostics);
            }
            Some(kind) => {
                assert!(selection.is_none());
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].kind, kind);
            }
        }
    }

    #[test]
    fn test_designated_wins_and_keeps_parameter_order() {
        let (selection, _) = run(service(vec![ctor(true, false, &[]), ctor(true, true, &["ILog", "IClock"])]));
        let selection = selection.unwrap();
        let params: Vec<&str> = selection.params.iter().map(|p| p.ty.as_str()).collect();
        assert_eq!(params, vec!["ILog", "IClock"]);
    }

    #[test]
    fn test_static_constructors_are_ignored() {
        let mut type_init = ctor(true, false, &[]);
        type_init.is_static = true;
        let (selection, diagnostics) = run(service(vec![type_init, ctor(true, false, &["IClock"])]));
        assert!(selection.is_some());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_each_invalid_parameter_is_reported() {
        let (selection, diagnostics) = run(service(vec![ctor(true, false, &["Spawner", "IClock", "IMissing"])]));
        assert!(selection.is_none());
        let kinds: Vec<DiagnosticKind> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&DiagnosticKind::InvalidConstructorParameter));
        assert!(kinds.contains(&DiagnosticKind::UnknownType));
    }

    #[test]
    fn test_designated_on_non_service_is_reported() {
        let mut decl = service(vec![ctor(true, true, &[])]);
        decl.service.clear();
        decl.host = true;
        let (selection, diagnostics) = run(decl);
        assert!(selection.is_none());
        assert_eq!(diagnostics[0].kind, DiagnosticKind::DesignatedOnNonService);
    }

    #[test]
    fn test_selection_params_are_copied() {
        let (selection, _) = run(service(vec![ctor(true, false, &["IClock"])]));
        let expected: SmallVec<[ParamDecl; 4]> =
            smallvec![ParamDecl { name: "p0".into(), ty: "IClock".into(), location: Location::default() }];
        assert_eq!(selection.unwrap().params, expected);
    }
}
