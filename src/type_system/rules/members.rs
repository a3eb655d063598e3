//! Rule for provide/inject markers on fields and properties.
use super::exposure::{validate_exposed_types, ExposedTypeSet};
use super::inject::{check_inject_type, InjectTypeProblem};
use crate::store::{DeclaredType, Location, MemberDecl, Role, TypeDecl, TypeName};
use crate::type_system::TypeContext;
use crate::validation::{Diagnostic, DiagnosticBag, DiagnosticKind};
use serde::Serialize;

/// A provide-member of a Host, with the types its instance is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provision {
    pub member: String,
    pub ty: TypeName,
    pub exposes: ExposedTypeSet,
    pub location: Location,
}

/// An inject-member of a User.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Injection {
    pub member: String,
    pub ty: TypeName,
    pub location: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedMembers {
    pub provisions: Vec<Provision>,
    pub injections: Vec<Injection>,
}

/// Validates every marked member of `decl` against its role.
pub fn process_members(
    ctx: &TypeContext<'_>,
    decl: &TypeDecl,
    declared: &DeclaredType,
    bag: &mut DiagnosticBag,
) -> ProcessedMembers {
    let mut out = ProcessedMembers::default();

    for member in &decl.members {
        let provide = member.provide.is_some();
        if !provide && !member.inject {
            continue;
        }

        let report = |bag: &mut DiagnosticBag, kind: DiagnosticKind, message: String| {
            bag.push(Diagnostic::new(kind, &decl.name, &member.location, message));
        };

        // Every marker problem is reported before deciding whether the member is usable.
        let mut usable = true;
        if provide && !declared.role.provides() {
            report(bag, DiagnosticKind::ProvideRequiresHost, format!(
                "'{}.{}' provides a service but '{}' is a {}, not a Host",
                decl.name, member.name, decl.name, declared.role
            ));
            usable = false;
        }
        if member.inject && !declared.role.injects() {
            report(bag, DiagnosticKind::InjectRequiresUser, format!(
                "'{}.{}' is injected but '{}' is a {}, not a User",
                decl.name, member.name, decl.name, declared.role
            ));
            usable = false;
        }
        if provide && member.inject {
            report(bag, DiagnosticKind::ProvideAndInject, format!(
                "Member '{}.{}' cannot be both provided and injected", decl.name, member.name
            ));
            usable = false;
        }
        if member.is_static {
            report(bag, DiagnosticKind::StaticMember, format!(
                "Static member '{}.{}' cannot take part in injection", decl.name, member.name
            ));
            usable = false;
        }
        if !usable {
            continue;
        }

        if provide {
            if let Some(p) = process_provision(ctx, decl, member, bag) {
                out.provisions.push(p);
            }
        } else if let Some(i) = process_injection(ctx, decl, member, bag) {
            out.injections.push(i);
        }
    }

    out
}

fn process_provision(
    ctx: &TypeContext<'_>,
    decl: &TypeDecl,
    member: &MemberDecl,
    bag: &mut DiagnosticBag,
) -> Option<Provision> {
    if !ctx.table.contains(&member.ty) {
        bag.push(Diagnostic::new(
            DiagnosticKind::UnknownType,
            &decl.name,
            &member.location,
            format!("Type '{}' of provided member '{}.{}' is not declared", member.ty, decl.name, member.name),
        ));
        return None;
    }
    if ctx.role_of(&member.ty) == Some(Role::Service) {
        bag.push(Diagnostic::new(
            DiagnosticKind::ProvidesServiceInstance,
            &decl.name,
            &member.location,
            format!(
                "'{}.{}' provides an instance of Service '{}'; services are owned by their scope",
                decl.name, member.name, member.ty
            ),
        ));
    }

    let explicit = member.provide.as_ref().map(|p| p.exposes.as_slice()).unwrap_or_default();
    let fallback = [member.ty.clone()];
    let exposes = if explicit.is_empty() { &fallback[..] } else { explicit };
    let exposes = validate_exposed_types(ctx, &decl.name, &member.ty, exposes, &member.location, true, bag);

    Some(Provision { member: member.name.clone(), ty: member.ty.clone(), exposes, location: member.location.clone() })
}

fn process_injection(
    ctx: &TypeContext<'_>,
    decl: &TypeDecl,
    member: &MemberDecl,
    bag: &mut DiagnosticBag,
) -> Option<Injection> {
    if !member.kind.is_writable() {
        bag.push(Diagnostic::new(
            DiagnosticKind::InjectMemberNotWritable,
            &decl.name,
            &member.location,
            format!("Injected member '{}.{}' must be writable", decl.name, member.name),
        ));
    }
    if let Err(problem) = check_inject_type(ctx, &member.ty) {
        let kind = match problem {
            InjectTypeProblem::Unknown => DiagnosticKind::UnknownType,
            _ => DiagnosticKind::InvalidInjectType,
        };
        bag.push(Diagnostic::new(
            kind,
            &decl.name,
            &member.location,
            format!("Injected member '{}.{}' has type '{}': {}", decl.name, member.name, member.ty, problem),
        ));
        return None;
    }

    Some(Injection { member: member.name.clone(), ty: member.ty.clone(), location: member.location.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeclarationTable, Lifetime, MemberKind, ProvideMarker, ServiceMarker, Snapshot, TypeKind};
    use crate::type_system::classify;

    fn field(name: &str, ty: &str) -> MemberDecl {
        MemberDecl {
            name: name.into(),
            ty: ty.into(),
            kind: MemberKind::Field { read_only: false },
            is_static: false,
            provide: None,
            inject: false,
            location: Location::default(),
        }
    }

    fn provided(name: &str, ty: &str, exposes: &[&str]) -> MemberDecl {
        MemberDecl {
            provide: Some(ProvideMarker { exposes: exposes.iter().map(|e| TypeName::from(*e)).collect() }),
            ..field(name, ty)
        }
    }

    fn injected(name: &str, ty: &str) -> MemberDecl {
        MemberDecl { inject: true, ..field(name, ty) }
    }

    fn run(subject: TypeDecl) -> (ProcessedMembers, Vec<Diagnostic>) {
        let mut clock = TypeDecl::new("Clock", TypeKind::Class);
        clock.bases = vec!["IClock".into()];
        let mut svc = TypeDecl::new("Audio", TypeKind::Class);
        svc.service.push(ServiceMarker { lifetime: Lifetime::Singleton, exposes: vec![] });
        let mut level = TypeDecl::new("Level", TypeKind::Class);
        level.user = true;

        let table = DeclarationTable::from_snapshot(&Snapshot::new(vec![
            subject,
            TypeDecl::new("IClock", TypeKind::Interface),
            clock,
            svc,
            level,
        ]));
        let mut bag = DiagnosticBag::default();
        let mut ctx = TypeContext::new(&table);
        for d in table.iter() {
            let declared = classify(d, &mut bag);
            ctx.classified.insert(d.name.clone(), declared);
        }
        let decl = table.get(&"Subject".into()).unwrap();
        let declared = ctx.declared(&decl.name).unwrap().clone();
        let processed = process_members(&ctx, decl, &declared, &mut bag);
        (processed, bag.into_sorted())
    }

    fn subject(host: bool, user: bool, members: Vec<MemberDecl>) -> TypeDecl {
        TypeDecl { host, user, members, extensible: true, ..TypeDecl::new("Subject", TypeKind::Class) }
    }

    fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
        diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_host_provision_defaults_to_member_type() {
        let (processed, diagnostics) = run(subject(true, false, vec![provided("clock", "IClock", &[])]));
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(processed.provisions[0].exposes.as_slice(), &[TypeName::from("IClock")]);
    }

    #[test]
    fn test_provision_of_class_is_a_warning() {
        let (processed, diagnostics) = run(subject(true, false, vec![provided("clock", "Clock", &["IClock", "Clock"])]));
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::ExposedTypeShouldBeInterface]);
        assert_eq!(processed.provisions[0].exposes.len(), 2);
    }

    #[test]
    fn test_unimplemented_exposed_type() {
        let (_, diagnostics) = run(subject(true, false, vec![provided("clock", "IClock", &["Clock"])]));
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::ExposedTypeNotImplemented]);
    }

    #[test]
    fn test_providing_a_service_instance_is_rejected() {
        let (_, diagnostics) = run(subject(true, false, vec![provided("audio", "Audio", &[])]));
        assert!(kinds(&diagnostics).contains(&DiagnosticKind::ProvidesServiceInstance));
    }

    #[test]
    fn test_role_mismatches() {
        let (processed, diagnostics) =
            run(subject(false, false, vec![provided("clock", "IClock", &[]), injected("clock2", "IClock")]));
        assert!(processed.provisions.is_empty());
        assert!(processed.injections.is_empty());
        assert_eq!(
            kinds(&diagnostics),
            vec![DiagnosticKind::ProvideRequiresHost, DiagnosticKind::InjectRequiresUser]
        );
    }

    #[test]
    fn test_both_markers_and_static_members() {
        let mut both = provided("a", "IClock", &[]);
        both.inject = true;
        let mut stat = injected("b", "IClock");
        stat.is_static = true;
        let (_, diagnostics) = run(subject(true, true, vec![both, stat]));
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::ProvideAndInject, DiagnosticKind::StaticMember]);
    }

    #[test]
    fn test_static_provide_on_service_reports_role_too() {
        let mut stat = provided("clock", "IClock", &[]);
        stat.is_static = true;
        let mut both = provided("other", "IClock", &[]);
        both.inject = true;
        let mut svc = subject(false, false, vec![stat, both]);
        svc.service.push(ServiceMarker { lifetime: Lifetime::Singleton, exposes: vec![] });

        let (processed, diagnostics) = run(svc);
        assert!(processed.provisions.is_empty());
        assert_eq!(
            kinds(&diagnostics),
            vec![
                DiagnosticKind::ProvideAndInject,
                DiagnosticKind::ProvideRequiresHost,
                DiagnosticKind::ProvideRequiresHost,
                DiagnosticKind::InjectRequiresUser,
                DiagnosticKind::StaticMember,
            ]
        );
    }

    #[test]
    fn test_injection_rules() {
        let mut read_only = injected("clock", "IClock");
        read_only.kind = MemberKind::Property { has_setter: false };
        let (processed, diagnostics) =
            run(subject(false, true, vec![read_only, injected("level", "Level"), injected("ok", "IClock")]));

        assert_eq!(
            kinds(&diagnostics),
            vec![DiagnosticKind::InjectMemberNotWritable, DiagnosticKind::InvalidInjectType]
        );
        let names: Vec<&str> = processed.injections.iter().map(|i| i.member.as_str()).collect();
        assert_eq!(names, vec!["clock", "ok"]);
    }
}
