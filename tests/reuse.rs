use parking_lot::Mutex;
use rewire::{
    Component, Container, DefinitionMap, Dependencies, DiError, Instance, Module, Resolution,
    Resolve, StaticResolver, UpdateOutcome,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Keeps the keys of the dependency set it was last given.
struct Shared {
    applied: Mutex<Vec<String>>,
}

impl Shared {
    fn keys(deps: &Dependencies) -> Vec<String> {
        deps.iter().map(|(key, _)| key.to_string()).collect()
    }
}

impl Component for Shared {
    fn update(&self, method: &str, deps: &Dependencies) -> Option<UpdateOutcome> {
        (method == "update").then(|| {
            *self.applied.lock() = Shared::keys(deps);
            Resolution::ok(None)
        })
    }
}

struct Leaf;
impl Component for Leaf {}

fn setup(definitions: &str) -> (Container, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let resolver = StaticResolver::new()
        .with(
            "A",
            Module::new("A").constructor(move |deps: &Dependencies| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Shared {
                    applied: Mutex::new(Shared::keys(deps)),
                })
            }),
        )
        .with("X", Module::new("X").constructor(|_: &Dependencies| Ok(Leaf)))
        .with("Y", Module::new("Y").constructor(|_: &Dependencies| Ok(Leaf)));
    let definitions: DefinitionMap = serde_json::from_str(definitions).unwrap();
    let container = Container::builder()
        .resolver(resolver)
        .definitions(definitions)
        .build()
        .unwrap();
    (container, builds)
}

fn applied(instance: &Instance) -> Vec<String> {
    instance.downcast::<Shared>().unwrap().applied.lock().clone()
}

const ALIASES: &str = r#"{ "a1": ["!A", { "x": "X" }], "a2": ["!A", { "y": "Y" }] }"#;

#[test]
fn test_aliases_share_one_instance() {
    let (container, builds) = setup(ALIASES);
    let session = container.session();

    let first = session.get("a1").into_ready("a1").unwrap();
    assert_eq!(applied(&first), vec!["x"]);

    let second = session.get("a2").into_ready("a2").unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(applied(&second), vec!["y"]);
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    // Most recently resolved alias wins
    session.get("a1").into_ready("a1").unwrap();
    assert_eq!(applied(&first), vec!["x"]);
    assert_eq!(
        container.definition("A").unwrap().applied_from.as_deref(),
        Some("a1")
    );
    session.close();
}

#[test]
fn test_alias_definition_has_no_instance() {
    let (container, _) = setup(ALIASES);
    container.get("a1").into_ready("a1").unwrap();

    let alias = container.definition("a1").unwrap();
    assert_eq!(alias.reuse.as_deref(), Some("A"));
    assert_eq!(alias.parent_id, "A");
    assert!(alias.instance.live().is_none());
    assert!(container.definition("A").unwrap().instance.live().is_some());
}

#[test]
fn test_alias_without_dependencies_uses_target_dependencies() {
    let (container, _) = setup(r#"{ "A": { "x": "X" }, "alias": "!A" }"#);

    let through_alias = container.get("alias").into_ready("alias").unwrap();
    let direct = container.get("A").into_ready("A").unwrap();
    assert!(through_alias.ptr_eq(&direct));
    assert_eq!(applied(&direct), vec!["x"]);
}

#[test]
fn test_reuse_chain() {
    let (container, builds) = setup(r#"{ "a1": ["!A", { "x": "X" }], "b": "!a1", "c": "!b" }"#);

    let c = container.get("c").into_ready("c").unwrap();
    let a1 = container.get("a1").into_ready("a1").unwrap();
    assert!(c.ptr_eq(&a1));
    assert_eq!(applied(&c), vec!["x"]);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reuse_cycle() {
    let (container, _) = setup(r#"{ "p": "!q", "q": "!p" }"#);
    let err = container.get("p").into_ready("p").unwrap_err();
    match err {
        DiError::Circular(path) => assert_eq!(path, vec!["p", "q", "p"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_alias_of_persistent_instance() {
    let (container, builds) = setup(ALIASES);
    let injected = Instance::new(Shared {
        applied: Mutex::new(Vec::new()),
    });
    container.put("A", injected.clone()).unwrap();

    let session = container.session();
    assert!(session.get("a1").into_ready("a1").unwrap().ptr_eq(&injected));
    assert!(session.get("a2").into_ready("a2").unwrap().ptr_eq(&injected));
    assert!(applied(&injected).is_empty());
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    session.close();
}
