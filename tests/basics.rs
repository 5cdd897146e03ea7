use rewire::{
    Component, Container, DefinitionMap, Dependencies, DependencyMap, DiError, Export, Instance,
    Module, ModuleResolver, Resolution, Resolve, StaticResolver,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct Node {
    name: String,
    deps: Dependencies,
}
impl Component for Node {}

fn node_module(name: &str, builds: Arc<AtomicUsize>) -> Module {
    let owned = name.to_string();
    Module::new(name).constructor(move |deps: &Dependencies| {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok(Node {
            name: owned.clone(),
            deps: deps.clone(),
        })
    })
}

fn setup(definitions: &str, modules: &[&str]) -> (Container, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let resolver = modules.iter().fold(StaticResolver::new(), |resolver, name| {
        resolver.with(*name, node_module(name, builds.clone()))
    });
    let definitions: DefinitionMap = serde_json::from_str(definitions).unwrap();
    let container = Container::builder()
        .resolver(resolver)
        .definitions(definitions)
        .build()
        .unwrap();
    (container, builds)
}

fn node(scope: &impl Resolve, id: &str) -> Arc<Node> {
    scope.get_as::<Node>(id).into_ready(id).unwrap()
}

// ===== Resolution =====

#[test]
fn test_dependency_is_injected() {
    let (container, _) = setup(r#"{ "a": { "b": "b" } }"#, &["a", "b"]);

    let a = node(&container, "a");
    let b = node(&container, "b");
    assert_eq!(a.name, "a");
    assert!(Arc::ptr_eq(&a.deps.get::<Node>("b").unwrap(), &b));
}

#[test]
fn test_memoization() {
    let (container, builds) = setup(r#"{ "a": { "b": "b" } }"#, &["a", "b"]);

    let first = node(&container, "a");
    let second = node(&container, "a");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_diamond_shares_instance() {
    let (container, builds) = setup(
        r#"{
            "top": { "left": "left", "right": "right" },
            "left": { "shared": "shared" },
            "right": { "shared": "shared" }
        }"#,
        &["top", "left", "right", "shared"],
    );

    let top = node(&container, "top");
    let left = top.deps.get::<Node>("left").unwrap();
    let right = top.deps.get::<Node>("right").unwrap();
    assert!(Arc::ptr_eq(
        &left.deps.get::<Node>("shared").unwrap(),
        &right.deps.get::<Node>("shared").unwrap()
    ));
    assert_eq!(builds.load(Ordering::SeqCst), 4);
}

#[test]
fn test_inline_dependencies_are_not_shared() {
    let (container, _) = setup(
        r#"{ "x": { "dep": { "c": "c" } }, "y": { "dep": { "c": "c" } } }"#,
        &["x", "y", "dep", "c"],
    );

    let x = node(&container, "x");
    let y = node(&container, "y");
    let x_dep = x.deps.get::<Node>("dep").unwrap();
    let y_dep = y.deps.get::<Node>("dep").unwrap();
    assert!(!Arc::ptr_eq(&x_dep, &y_dep));
    // Their own string dependency is shared
    assert!(Arc::ptr_eq(
        &x_dep.deps.get::<Node>("c").unwrap(),
        &y_dep.deps.get::<Node>("c").unwrap()
    ));
}

#[test]
fn test_put_returns_injected_instance() {
    let (container, builds) = setup(r#"{ "app": { "config": "config" } }"#, &["app"]);
    let config = Instance::value(json!({ "x": 1 }));
    container.put("config", config.clone()).unwrap();

    let resolved = container.get("config").into_ready("config").unwrap();
    assert!(resolved.ptr_eq(&config));
    assert_eq!(resolved.downcast::<serde_json::Value>().unwrap()["x"], 1);

    let app = node(&container, "app");
    assert!(app.deps.instance("config").unwrap().ptr_eq(&config));
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    let definition = container.definition("config").unwrap();
    assert!(definition.is_persistent);
}

#[test]
fn test_put_replaces_persistent_instance() {
    let container = Container::builder().build().unwrap();
    container.put("config", Instance::value(1u8)).unwrap();
    container.put("config", Instance::value(2u8)).unwrap();
    let config = container.get_as::<u8>("config").into_ready("config").unwrap();
    assert_eq!(*config, 2);
}

#[test]
fn test_get_as_type_mismatch() {
    let container = Container::builder().build().unwrap();
    container.put("port", Instance::value(8080u16)).unwrap();
    let err = container.get_as::<String>("port").into_ready("port").unwrap_err();
    assert!(matches!(err, DiError::TypeMismatch { key, .. } if key == "port"));
}

// ===== Factories =====

struct Widget(&'static str);
impl Component for Widget {}

fn widgets() -> Container {
    let module = Module::new("Widget")
        .constructor(|_: &Dependencies| Ok(Widget("default")))
        .factory("small", |_: &Dependencies| Ok(Widget("small")))
        .raw_factory("nothing", |_| Resolution::ok(None));
    Container::builder()
        .resolver(StaticResolver::new().with("Widget", module))
        .build()
        .unwrap()
}

#[test]
fn test_named_factory() {
    let container = widgets();
    let small = container.get_as::<Widget>("Widget.small").into_ready("small").unwrap();
    let default = container.get_as::<Widget>("Widget").into_ready("default").unwrap();
    assert_eq!(small.0, "small");
    assert_eq!(default.0, "default");
}

#[test]
fn test_factory_not_found() {
    let err = widgets().get("Widget.large").into_ready("large").unwrap_err();
    match err {
        DiError::FactoryNotFound { id, factory } => {
            assert_eq!(id, "Widget.large");
            assert_eq!(factory, "large");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_factory_result() {
    let err = widgets().get("Widget.nothing").into_ready("nothing").unwrap_err();
    assert!(matches!(err, DiError::EmptyFactoryResult { factory, .. } if factory == "nothing"));
}

#[test]
fn test_primitive_export_is_not_constructible() {
    let container = Container::builder()
        .resolver(StaticResolver::new().with("port", Export::Primitive(json!(8080))))
        .build()
        .unwrap();
    let err = container.get("port").into_ready("port").unwrap_err();
    assert!(matches!(err, DiError::NotConstructible { actual, .. } if actual == "number"));
}

#[test]
fn test_namespace_export_uses_primary_member() {
    let namespace = Export::Namespace {
        default: Box::new(Module::new("Widget").constructor(|_: &Dependencies| Ok(Widget("primary"))).into()),
        members: BTreeMap::from([("VERSION".to_string(), Export::Primitive(json!("1.0")))]),
    };
    let container = Container::builder()
        .resolver(StaticResolver::new().with("widgets", namespace))
        .build()
        .unwrap();
    let widget = container.get_as::<Widget>("widgets").into_ready("widgets").unwrap();
    assert_eq!(widget.0, "primary");
}

#[test]
fn test_resolver_chain_first_match_wins() {
    let container = Container::builder()
        .resolver(|name: &str| (name == "Widget").then(|| {
            Resolution::ok(Export::from(Module::new("Widget").constructor(|_: &Dependencies| Ok(Widget("first")))))
        }))
        .resolver(StaticResolver::new()
            .with("Widget", Module::new("Widget").constructor(|_: &Dependencies| Ok(Widget("second"))))
            .with("Other", Module::new("Other").constructor(|_: &Dependencies| Ok(Widget("other")))))
        .build()
        .unwrap();

    assert_eq!(container.get_as::<Widget>("Widget").into_ready("w").unwrap().0, "first");
    assert_eq!(container.get_as::<Widget>("Other").into_ready("o").unwrap().0, "other");
    assert!(container.definition("Widget").unwrap().module.is_some());
}

// ===== Failures =====

#[test]
fn test_failed_factory_can_be_retried() {
    struct Flaky;
    impl Component for Flaky {}

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let module = Module::new("Flaky").constructor(move |_: &Dependencies| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(DiError::factory("connection refused"));
        }
        Ok(Flaky)
    });
    let container = Container::builder()
        .resolver(StaticResolver::new().with("Flaky", module))
        .build()
        .unwrap();

    let err = container.get("Flaky").into_ready("Flaky").unwrap_err();
    assert_eq!(err.to_string(), "connection refused");
    assert!(container.definition("Flaky").unwrap().instance.live().is_none());

    let flaky = container.get("Flaky").into_ready("Flaky").unwrap();
    assert!(flaky.downcast::<Flaky>().is_some());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failing_dependency_fails_parent() {
    let (container, builds) = setup(r#"{ "a": { "b": "b", "missing": "missing" } }"#, &["a", "b"]);

    let err = container.get("a").into_ready("a").unwrap_err();
    assert!(matches!(err, DiError::BundleNotFound(name) if name == "missing"));
    assert!(container.definition("a").unwrap().instance.live().is_none());
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_malformed_reference() {
    let (container, _) = setup(r#"{ "a": { "b": "b.c.d" } }"#, &["a"]);
    let err = container.get("a").into_ready("a").unwrap_err();
    assert!(matches!(err, DiError::InvalidDefinitionFormat(raw) if raw == "b.c.d"));
}

// ===== Definitions =====

#[test]
fn test_implicit_definition_for_unknown_id() {
    let (container, _) = setup("{}", &["lonely"]);
    assert!(!container.definitions().contains_key("lonely"));
    node(&container, "lonely");

    let definition = container.definition("lonely").unwrap();
    assert_eq!(definition.bundle_name.as_deref(), Some("lonely"));
    assert!(definition.dependencies.is_empty());
}

#[test]
fn test_derived_definition() {
    let (container, _) = setup(
        r#"{
            "Base": ["Node", { "b": "b", "dropped": "b" }],
            "child": ["Base", { "c": "c", "dropped": null }]
        }"#,
        &["Node", "b", "c"],
    );

    let child = node(&container, "child");
    assert_eq!(child.name, "Node");
    assert!(child.deps.contains("b"));
    assert!(child.deps.contains("c"));
    assert!(!child.deps.contains("dropped"));
    assert_eq!(container.definition("child").unwrap().parent_id, "Base");
}

#[test]
fn test_define_after_build() {
    let (container, _) = setup("{}", &["a", "b"]);
    container.define("a", rewire::RawDefinition::dependencies([("b", "b")])).unwrap();
    let a = node(&container, "a");
    assert!(a.deps.contains("b"));
}

#[test]
fn test_define_all_keeps_existing_ids() {
    let (container, _) = setup(r#"{ "a": { "b": "b" } }"#, &["a", "b", "c"]);
    let more: DefinitionMap = serde_json::from_str(r#"{ "a": { "c": "c" }, "extra": ["a", { "c": "c" }] }"#).unwrap();
    container.define_all(&more).unwrap();

    // `a` was already registered and stays as configured
    let a = node(&container, "a");
    assert!(a.deps.contains("b") && !a.deps.contains("c"));
    let extra = node(&container, "extra");
    assert!(extra.deps.contains("b") && extra.deps.contains("c"));
    assert_eq!(container.definition("extra").unwrap().parent_id, "a");
}

#[test]
fn test_shared_resolver_across_containers() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = lookups.clone();
    let resolver: Arc<dyn ModuleResolver> = Arc::new(move |name: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        (name == "Widget").then(|| {
            Resolution::ok(Export::from(Module::new("Widget").constructor(|_: &Dependencies| Ok(Widget("shared")))))
        })
    });

    let first = Container::builder().shared_resolver(resolver.clone()).build().unwrap();
    let second = Container::builder().shared_resolver(resolver).build().unwrap();
    let a = first.get_as::<Widget>("Widget").into_ready("Widget").unwrap();
    let b = second.get_as::<Widget>("Widget").into_ready("Widget").unwrap();

    assert_eq!((a.0, b.0), ("shared", "shared"));
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn test_instance_definition_reverse_lookup() {
    let (container, _) = setup(r#"{ "a": { "b": "b" } }"#, &["a", "b"]);
    let a = container.get("a").into_ready("a").unwrap();
    assert_eq!(container.instance_definition(&a).unwrap().id, "a");
    assert!(container.instance_definition(&Instance::value(0u8)).is_none());
}

#[test]
fn test_inline_graph() {
    let (container, builds) = setup("{}", &["a", "b", "second"]);
    let graph: DependencyMap = serde_json::from_str(r#"{ "first": "a", "second": { "b": "b" } }"#).unwrap();

    let resolved = container.get_graph(&graph).into_ready("graph").unwrap();
    assert_eq!(resolved.get::<Node>("first").unwrap().name, "a");
    let second = resolved.get::<Node>("second").unwrap();
    assert!(second.deps.contains("b"));

    let again = container.get_graph(&graph).into_ready("graph").unwrap();
    assert!(Arc::ptr_eq(&again.get::<Node>("second").unwrap(), &second));
    assert_eq!(builds.load(Ordering::SeqCst), 3);
}

// ===== Validity =====

struct Expiring {
    expired: AtomicBool,
    destroyed: Arc<AtomicUsize>,
}

impl Component for Expiring {
    fn is_valid(&self, _params: &rewire::Params) -> bool {
        !self.expired.load(Ordering::SeqCst)
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_invalid_instance_is_rebuilt() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let hook = destroyed.clone();
    let module = Module::new("token").constructor(move |_: &Dependencies| {
        Ok(Expiring {
            expired: AtomicBool::new(false),
            destroyed: hook.clone(),
        })
    });
    let container = Container::builder()
        .resolver(StaticResolver::new().with("token", module))
        .build()
        .unwrap();

    let first = container.get_as::<Expiring>("token").into_ready("token").unwrap();
    first.expired.store(true, Ordering::SeqCst);
    let second = container.get_as::<Expiring>("token").into_ready("token").unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    // Superseded, not reclaimed
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);
}

// ===== Threading =====

#[test]
fn test_parallel_sync_builds_settle_on_one_instance() {
    let (container, builds) = setup(r#"{ "a": { "b": "b" } }"#, &["a", "b"]);

    let built: Vec<Instance> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| container.get("a").into_ready("a").unwrap()))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let cached = container.get("a").into_ready("a").unwrap();
    assert!(built.iter().any(|instance| instance.ptr_eq(&cached)));
    assert!(cached.ptr_eq(&container.get("a").into_ready("a").unwrap()));
    assert!((2..=8).contains(&builds.load(Ordering::SeqCst)));
}
