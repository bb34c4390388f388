//! Call-site facts: status checks, error paths, pagination and idempotency.

use crate::extract::FunctionScope;
use crate::registry::{CallKind, FallibleEntry};
use std::collections::BTreeSet;
use stricture_kernel::ir::expr;
use stricture_kernel::{
    CallExpr, EffectKind, ErrorPathFact, Fact, GuardKind, IdempotencyFact, Node, NodeKind,
    PaginationFact, StatusCheckFact,
};

/// Properties that carry a response status rather than its body.
const STATUS_PROPERTIES: &[&str] = &[
    "status",
    "ok",
    "statusCode",
    "status_code",
    "StatusCode",
    "Status",
    "statusText",
    "status_text",
];

/// Calls that release a response without reading it.
const RELEASE_CALLS: &[&str] = &["close", "Close", "release", "dispose", "destroy", "cancel"];

pub(crate) fn collect(scope: &FunctionScope<'_>, out: &mut Vec<Fact>) {
    for (id, node) in scope.cfg.statements() {
        let NodeKind::Call(call) = &node.kind else {
            continue;
        };
        if let Some(entry) = scope.registry.classify(&call.callee) {
            out.push(Fact::ErrorPath(error_path(scope, id, node, call)));
            if entry.kind == CallKind::Http {
                out.push(Fact::StatusCheck(status_check(scope, id, node, call, entry)));
            }
        }
        if let Some(target) = &call.target {
            out.push(Fact::Pagination(pagination(scope, id, node, call, target)));
        }
        if let Some(effect) = &call.effect
            && effect.kind == EffectKind::Write
        {
            out.push(Fact::Idempotency(idempotency(scope, id, node, call)));
        }
    }
}

pub(crate) fn is_status_expr(expression: &str) -> bool {
    let last = expr::last_segment(expression);
    STATUS_PROPERTIES.contains(&last.as_str())
}

fn is_error_symbol(symbol: &str) -> bool {
    matches!(symbol, "err" | "error" | "e" | "_" | "exc")
        || symbol.ends_with("Err")
        || symbol.ends_with("_err")
        || symbol.ends_with("Error")
}

/// `node` reads the result bound to `symbol` (status reads excluded).
fn is_use(scope: &FunctionScope<'_>, node: &Node, symbol: &str) -> bool {
    match &node.kind {
        NodeKind::Call(call) => {
            if scope.registry.is_status_guard(&call.callee) {
                return false;
            }
            let last = expr::last_segment(&call.callee);
            if call.receiver_symbol() == Some(symbol) && RELEASE_CALLS.contains(&last.as_str()) {
                return false;
            }
            call.uses(symbol)
        }
        NodeKind::PropertyAccess(access) => {
            if !expr::mentions(&access.base, symbol) {
                return false;
            }
            let direct = expr::same(&access.base, symbol);
            !(direct && STATUS_PROPERTIES.contains(&access.property.as_str()))
                && !is_status_expr(&access.base)
        }
        NodeKind::FieldBinding(binding) => expr::mentions(&binding.symbol, symbol),
        NodeKind::Assertion(assertion) => {
            expr::mentions(&assertion.subject, symbol) && !is_status_expr(&assertion.subject)
        }
        NodeKind::Conditional(cond) => {
            !matches!(cond.guard.kind, GuardKind::StatusCheck | GuardKind::ErrorCheck)
                && expr::mentions(&cond.guard.subject, symbol)
                && !is_status_expr(&cond.guard.subject)
        }
        NodeKind::Switch(sw) => {
            expr::mentions(&sw.discriminant, symbol) && !is_status_expr(&sw.discriminant)
        }
        NodeKind::Loop(lp) => lp.condition.as_ref().is_some_and(|guard| {
            guard.kind != GuardKind::StatusCheck
                && expr::mentions(&guard.subject, symbol)
                && !is_status_expr(&guard.subject)
        }),
        NodeKind::Exit(exit) => exit
            .value
            .as_deref()
            .is_some_and(|value| !expr::same(value, symbol) && expr::mentions(value, symbol)),
        NodeKind::TryCatch(_) | NodeKind::Break | NodeKind::Continue => false,
    }
}

/// `node` validates the status of the response bound to `symbol`.
fn is_status_guard_for(scope: &FunctionScope<'_>, node: &Node, symbol: &str) -> bool {
    match &node.kind {
        NodeKind::Conditional(cond) => {
            expr::mentions(&cond.guard.subject, symbol)
                && (cond.guard.kind == GuardKind::StatusCheck || is_status_expr(&cond.guard.subject))
        }
        NodeKind::Loop(lp) => lp.condition.as_ref().is_some_and(|guard| {
            expr::mentions(&guard.subject, symbol)
                && (guard.kind == GuardKind::StatusCheck || is_status_expr(&guard.subject))
        }),
        NodeKind::Switch(sw) => {
            expr::mentions(&sw.discriminant, symbol) && is_status_expr(&sw.discriminant)
        }
        NodeKind::Call(call) => scope.registry.is_status_guard(&call.callee) && call.uses(symbol),
        NodeKind::Assertion(assertion) => {
            expr::mentions(&assertion.subject, symbol) && is_status_expr(&assertion.subject)
        }
        _ => false,
    }
}

/// `node` checks the error or status produced by the call bound to `symbol`.
fn is_error_guard_for(scope: &FunctionScope<'_>, node: &Node, symbol: &str) -> bool {
    if is_status_guard_for(scope, node, symbol) {
        return true;
    }
    FunctionScope::guard_of(node).is_some_and(|guard| {
        matches!(
            guard.kind,
            GuardKind::ErrorCheck | GuardKind::NullCheck | GuardKind::Truthy
        ) && expr::mentions(&guard.subject, symbol)
            && is_error_symbol(expr::root(&guard.subject))
    })
}

fn status_check(
    scope: &FunctionScope<'_>,
    id: usize,
    node: &Node,
    call: &CallExpr,
    entry: &FallibleEntry,
) -> StatusCheckFact {
    let inline = entry.raises_on_status || call.enclosing_guards.contains(&GuardKind::StatusCheck);
    let symbols: Vec<&str> = call
        .binds
        .iter()
        .map(String::as_str)
        .filter(|symbol| !is_error_symbol(symbol))
        .collect();

    let mut first_unchecked = None;
    if !inline {
        for symbol in &symbols {
            for (use_id, use_node) in scope.after(id, |n| is_use(scope, n, symbol)) {
                let checked = scope.dominated_by(use_id, |guard_id, guard_node| {
                    scope.dominators.dominates(id, guard_id)
                        && is_status_guard_for(scope, guard_node, symbol)
                });
                if !checked {
                    let location = scope.location(use_node);
                    if first_unchecked.as_ref().is_none_or(|seen| location < *seen) {
                        first_unchecked = Some(location);
                    }
                }
            }
        }
    }

    let (handled_codes, mut catch_all) = handled_statuses(scope, id, &symbols);
    if entry.raises_on_status && scope.cfg.node(id).protected {
        catch_all = true;
    }

    StatusCheckFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        callee: call.callee.clone(),
        target: call.target.clone(),
        method: call.method.clone(),
        checked_before_use: first_unchecked.is_none(),
        first_unchecked_use: first_unchecked,
        handled_codes,
        catch_all,
    }
}

/// Status codes tested on this call's bound result after the call, and
/// whether any branch handles "everything else".
fn handled_statuses(scope: &FunctionScope<'_>, id: usize, symbols: &[&str]) -> (BTreeSet<u16>, bool) {
    let tests_result = |subject: &str| symbols.iter().any(|symbol| expr::mentions(subject, symbol));
    let mut codes = BTreeSet::new();
    let mut catch_all = false;
    for (guard_id, node) in scope.cfg.statements() {
        if guard_id == id || !scope.dominators.dominates(id, guard_id) {
            continue;
        }
        match &node.kind {
            NodeKind::Conditional(cond)
                if (cond.guard.kind == GuardKind::StatusCheck || is_status_expr(&cond.guard.subject))
                    && tests_result(&cond.guard.subject) =>
            {
                let explicit = cond.guard.status_codes();
                if explicit.is_empty()
                    || cond.guard.kind == GuardKind::RangeCheck
                    || cond.else_branch.is_some()
                {
                    catch_all = true;
                }
                codes.extend(explicit);
            }
            NodeKind::Switch(sw) if is_status_expr(&sw.discriminant) && tests_result(&sw.discriminant) => {
                codes.extend(sw.covered_labels().filter_map(|l| l.trim().parse::<u16>().ok()));
                if sw.default.is_some() {
                    catch_all = true;
                }
            }
            NodeKind::Call(call)
                if scope.registry.is_status_guard(&call.callee)
                    && symbols.iter().any(|symbol| call.uses(symbol)) =>
            {
                catch_all = true;
            }
            _ => {}
        }
    }
    (codes, catch_all)
}

fn error_path(scope: &FunctionScope<'_>, id: usize, node: &Node, call: &CallExpr) -> ErrorPathFact {
    let inline = call
        .enclosing_guards
        .iter()
        .any(|kind| matches!(kind, GuardKind::ErrorCheck | GuardKind::StatusCheck));
    let protected = scope.cfg.node(id).protected || inline || guarded_result(scope, id, call);
    ErrorPathFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        callee: call.callee.clone(),
        protected,
    }
}

/// The call's bound results are checked and every later use sits behind a check.
fn guarded_result(scope: &FunctionScope<'_>, id: usize, call: &CallExpr) -> bool {
    if call.binds.is_empty() {
        return false;
    }
    let is_guard = |guard_id: usize, guard_node: &Node| {
        scope.dominators.dominates(id, guard_id)
            && call
                .binds
                .iter()
                .any(|symbol| is_error_guard_for(scope, guard_node, symbol))
    };
    let has_guard = scope.cfg.statements().any(|(guard_id, guard_node)| {
        guard_id != id && is_guard(guard_id, guard_node)
    });
    if !has_guard {
        return false;
    }
    call.binds.iter().all(|symbol| {
        scope
            .after(id, |n| is_use(scope, n, symbol))
            .into_iter()
            .all(|(use_id, _)| scope.dominated_by(use_id, &is_guard))
    })
}

fn pagination(
    scope: &FunctionScope<'_>,
    id: usize,
    node: &Node,
    call: &CallExpr,
    target: &str,
) -> PaginationFact {
    let loops = &scope.cfg.node(id).loops;
    let mut consulted = BTreeSet::new();
    match loops.last() {
        Some(&header) => {
            if let Some(header_node) = scope.cfg.node(header).node {
                consulted_by(header_node, &mut consulted);
            }
            for (_, body_node) in scope.cfg.loop_body(header) {
                consulted_by(body_node, &mut consulted);
            }
        }
        None => {
            for (_, any) in scope.cfg.statements() {
                consulted_by(any, &mut consulted);
            }
        }
    }
    PaginationFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        callee: call.callee.clone(),
        target: target.to_string(),
        method: call.method.clone(),
        in_loop: !loops.is_empty(),
        consulted,
    }
}

fn consulted_by(node: &Node, into: &mut BTreeSet<String>) {
    let mut add = |expression: &str| {
        let segment = expr::last_segment(expression);
        if !segment.is_empty() {
            into.insert(segment);
        }
    };
    match &node.kind {
        NodeKind::Conditional(cond) => add(&cond.guard.subject),
        NodeKind::Loop(lp) => {
            if let Some(guard) = &lp.condition {
                add(&guard.subject);
            }
        }
        NodeKind::Switch(sw) => add(&sw.discriminant),
        NodeKind::PropertyAccess(access) => {
            add(&access.property);
            add(&access.base);
        }
        NodeKind::FieldBinding(binding) => add(&binding.symbol),
        NodeKind::Call(call) => {
            for argument in &call.arguments {
                add(argument);
            }
        }
        _ => {}
    }
}

fn idempotency(scope: &FunctionScope<'_>, id: usize, node: &Node, call: &CallExpr) -> IdempotencyFact {
    let resource = call
        .effect
        .as_ref()
        .map(|effect| effect.resource.clone())
        .unwrap_or_default();
    let same_resource = |other: &str| other.eq_ignore_ascii_case(&resource);

    let read = scope
        .cfg
        .statements()
        .filter(|(read_id, read_node)| {
            *read_id != id
                && scope.dominators.dominates(*read_id, id)
                && matches!(&read_node.kind, NodeKind::Call(c)
                    if c.effect.as_ref().is_some_and(|e| e.kind == EffectKind::Read && same_resource(&e.resource)))
        })
        .map(|(_, read_node)| scope.location(read_node))
        .max();

    let conditional_write = call.effect.as_ref().is_some_and(|effect| effect.conditional);
    let inline_version = call.enclosing_guards.contains(&GuardKind::VersionCheck);
    let version_guard = scope.dominated_by(id, |_, guard_node| {
        FunctionScope::guard_of(guard_node).is_some_and(|guard| guard.kind == GuardKind::VersionCheck)
    });
    let atomic = scope.dominated_by(id, |_, other| {
        matches!(&other.kind, NodeKind::Call(c)
            if c.effect.as_ref().is_some_and(|e| e.kind == EffectKind::Atomic
                && (e.resource.is_empty() || same_resource(&e.resource))))
    });

    IdempotencyFact {
        location: scope.location(node),
        function: scope.function.to_string(),
        resource,
        callee: call.callee.clone(),
        read_location: read,
        guarded: conditional_write || inline_version || version_guard || atomic,
    }
}

#[cfg(test)]
mod tests {
    use crate::extract;
    use stricture_kernel::{
        CallExpr, Conditional, Effect, EffectKind, ExitStmt, Fact, FunctionDecl, Guard, GuardKind,
        LoopStmt, ModuleIr, Node, NodeKind, PropertyAccess, SourceLocation, TryCatch,
    };

    fn at(line: u32, kind: NodeKind) -> Node {
        Node::new(SourceLocation::new("src/client.ts", line, 1), kind)
    }

    fn bound(callee: &str, binds: &[&str]) -> CallExpr {
        let mut call = CallExpr::new(callee);
        call.binds = binds.iter().map(|s| s.to_string()).collect();
        call
    }

    fn read(line: u32, base: &str, property: &str) -> Node {
        at(
            line,
            NodeKind::PropertyAccess(PropertyAccess {
                base: base.into(),
                property: property.into(),
                ..PropertyAccess::default()
            }),
        )
    }

    fn cond(line: u32, guard: Guard, then_branch: Vec<Node>) -> Node {
        at(
            line,
            NodeKind::Conditional(Conditional {
                guard,
                then_branch,
                else_branch: None,
            }),
        )
    }

    fn facts(body: Vec<Node>) -> Vec<Fact> {
        let mut module = ModuleIr::new("src/client.ts", "typescript");
        module.functions.push(FunctionDecl {
            name: "load".into(),
            body,
            ..FunctionDecl::default()
        });
        extract(&module)
    }

    fn status(facts: &[Fact]) -> &stricture_kernel::StatusCheckFact {
        facts
            .iter()
            .find_map(Fact::as_status_check)
            .expect("status fact")
    }

    #[test]
    fn body_read_after_early_return_on_status_is_checked() {
        let facts = facts(vec![
            at(1, NodeKind::Call(bound("fetch", &["res"]))),
            cond(
                2,
                Guard::new(GuardKind::StatusCheck, "res.ok"),
                vec![at(3, NodeKind::Exit(ExitStmt { value: None, throws: true }))],
            ),
            at(4, NodeKind::Call(bound("res.json", &["body"]))),
        ]);
        let fact = status(&facts);
        assert!(fact.checked_before_use);
        assert!(fact.catch_all);
    }

    #[test]
    fn body_read_before_status_check_is_unchecked() {
        let facts = facts(vec![
            at(1, NodeKind::Call(bound("fetch", &["res"]))),
            at(2, NodeKind::Call(bound("res.json", &["body"]))),
            cond(
                3,
                Guard::new(GuardKind::StatusCheck, "res.status").with_values(["404"]),
                vec![],
            ),
        ]);
        let fact = status(&facts);
        assert!(!fact.checked_before_use);
        assert_eq!(fact.first_unchecked_use.as_ref().map(|l| l.line), Some(2));
        assert_eq!(fact.handled_codes.iter().copied().collect::<Vec<_>>(), vec![404]);
        assert!(!fact.catch_all);
    }

    #[test]
    fn status_handling_is_attributed_to_its_own_call() {
        let facts = facts(vec![
            at(1, NodeKind::Call(bound("fetch", &["orders"]))),
            cond(
                2,
                Guard::new(GuardKind::StatusCheck, "orders.status").with_values(["404", "500"]),
                vec![at(3, NodeKind::Exit(ExitStmt { value: None, throws: true }))],
            ),
            at(4, NodeKind::Call(bound("fetch", &["users"]))),
            at(5, NodeKind::Call(bound("users.json", &["list"]))),
        ]);
        let statuses: Vec<_> = facts.iter().filter_map(Fact::as_status_check).collect();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].location.line, 1);
        assert_eq!(statuses[0].handled_codes.iter().copied().collect::<Vec<_>>(), vec![404, 500]);
        assert_eq!(statuses[1].location.line, 4);
        assert!(statuses[1].handled_codes.is_empty());
        assert!(!statuses[1].catch_all);
        assert!(!statuses[1].checked_before_use);
    }

    #[test]
    fn try_with_handler_protects_fallible_call() {
        let facts = facts(vec![at(
            1,
            NodeKind::TryCatch(TryCatch {
                body: vec![at(2, NodeKind::Call(bound("fs.readFile", &["text"])))],
                handler: Some(vec![at(4, NodeKind::Call(CallExpr::new("logger.error")))]),
            }),
        )]);
        let fact = facts.iter().find_map(Fact::as_error_path).expect("error path");
        assert!(fact.protected);
    }

    #[test]
    fn go_style_error_check_protects_result_uses() {
        let facts = facts(vec![
            at(1, NodeKind::Call(bound("os.ReadFile", &["data", "err"]))),
            cond(
                2,
                Guard::new(GuardKind::ErrorCheck, "err"),
                vec![at(3, NodeKind::Exit(ExitStmt::default()))],
            ),
            at(4, NodeKind::Call(bound("json.Unmarshal", &["err2"]))),
        ]);
        let read_file = facts
            .iter()
            .filter_map(Fact::as_error_path)
            .find(|f| f.callee == "os.ReadFile")
            .expect("read fact");
        assert!(read_file.protected);
    }

    #[test]
    fn unguarded_fallible_call_is_unprotected() {
        let facts = facts(vec![
            at(1, NodeKind::Call(bound("JSON.parse", &["payload"]))),
            read(2, "payload", "id"),
        ]);
        let fact = facts.iter().find_map(Fact::as_error_path).expect("error path");
        assert!(!fact.protected);
    }

    #[test]
    fn pagination_loop_records_consulted_fields() {
        let mut call = bound("client.get", &["page"]);
        call.target = Some("/orders".into());
        let facts = facts(vec![at(
            1,
            NodeKind::Loop(LoopStmt {
                condition: Some(Guard::new(GuardKind::Truthy, "page.has_next_page")),
                body: vec![at(2, NodeKind::Call(call)), read(3, "page", "items")],
            }),
        )]);
        let fact = facts.iter().find_map(Fact::as_pagination).expect("pagination");
        assert!(fact.in_loop);
        assert!(fact.consulted.contains("has_next_page"));
        assert!(fact.consulted.contains("items"));
    }

    #[test]
    fn read_then_write_without_guard_is_flagged() {
        let mut get = CallExpr::new("db.get");
        get.effect = Some(Effect {
            kind: EffectKind::Read,
            resource: "inventory".into(),
            conditional: false,
        });
        let mut put = CallExpr::new("db.put");
        put.effect = Some(Effect {
            kind: EffectKind::Write,
            resource: "Inventory".into(),
            conditional: false,
        });
        let facts = facts(vec![at(1, NodeKind::Call(get)), at(2, NodeKind::Call(put))]);
        let fact = facts.iter().find_map(Fact::as_idempotency).expect("idempotency");
        assert_eq!(fact.read_location.as_ref().map(|l| l.line), Some(1));
        assert!(!fact.guarded);
    }

    #[test]
    fn version_check_guards_write() {
        let mut get = CallExpr::new("db.get");
        get.effect = Some(Effect {
            kind: EffectKind::Read,
            resource: "inventory".into(),
            conditional: false,
        });
        let mut put = CallExpr::new("db.put");
        put.effect = Some(Effect {
            kind: EffectKind::Write,
            resource: "inventory".into(),
            conditional: false,
        });
        let facts = facts(vec![
            at(1, NodeKind::Call(get)),
            cond(
                2,
                Guard::new(GuardKind::VersionCheck, "row.version"),
                vec![at(3, NodeKind::Exit(ExitStmt::default()))],
            ),
            at(4, NodeKind::Call(put)),
        ]);
        let fact = facts.iter().find_map(Fact::as_idempotency).expect("idempotency");
        assert!(fact.guarded);
    }
}
