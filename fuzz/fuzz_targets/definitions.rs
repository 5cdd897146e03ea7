#![no_main]

use libfuzzer_sys::fuzz_target;
use rewire::{config, Container, Spec};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Spec strings either parse into exactly one form or are rejected
    if let Ok(spec) = Spec::parse(source) {
        match spec {
            Spec::Reuse(target) => assert!(source.starts_with('!') && !target.is_empty()),
            Spec::Build { bundle, .. } => assert!(source.starts_with(bundle.as_str())),
        }
    }

    // Arbitrary maps normalize without panicking, and every string reference
    // they leave behind materializes under its own id
    let Ok(definitions) = config::from_json_str(source) else {
        return;
    };
    let Ok(container) = Container::builder().definitions(definitions).build() else {
        return;
    };
    for definition in container.definitions().into_values() {
        let targets = definition.dependencies.values().chain(definition.reuse.iter());
        for target in targets {
            if let Ok(found) = container.definition(target) {
                assert_eq!(&found.id, target);
            }
        }
    }
});
