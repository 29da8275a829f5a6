//! Fixed proxy handlers
//!
//! The runtime dispatches lifecycle, input, timer and slot events to handlers; the bundle
//! forwards each of them into its own `_G.Build*` dispatch tables. The tail is identical in
//! every build mode, apart from one tick handler per timer declared by the main file.

use log::debug;

use crate::{
    environment::Environment,
    output_module::{ArgMatcher, OutputModule, Slot, SlotKey},
    source_file::SourceFile,
};

struct LifecycleProxy {
    slot_key: SlotKey,
    signature: &'static str,
    wildcards: usize,
    code: &'static str,
}

const LIFECYCLE_PROXIES: [LifecycleProxy; 7] = [
    LifecycleProxy {
        slot_key: SlotKey::Unit,
        signature: "start",
        wildcards: 0,
        code: "_G.BuildUnit.Start()",
    },
    LifecycleProxy {
        slot_key: SlotKey::Unit,
        signature: "stop",
        wildcards: 0,
        code: "_G.BuildUnit.Stop()",
    },
    LifecycleProxy {
        slot_key: SlotKey::System,
        signature: "actionStart(action)",
        wildcards: 1,
        code: "_G.BuildSystem.ActionStart(action)",
    },
    LifecycleProxy {
        slot_key: SlotKey::System,
        signature: "actionStop(action)",
        wildcards: 1,
        code: "_G.BuildSystem.ActionStop(action)",
    },
    LifecycleProxy {
        slot_key: SlotKey::System,
        signature: "inputText(action)",
        wildcards: 1,
        code: "_G.BuildSystem.InputText(action)",
    },
    LifecycleProxy {
        slot_key: SlotKey::System,
        signature: "update",
        wildcards: 0,
        code: "_G.BuildSystem.Update()",
    },
    LifecycleProxy {
        slot_key: SlotKey::System,
        signature: "flush",
        wildcards: 0,
        code: "_G.BuildSystem.Flush()",
    },
];

/// Event forwarded once per numbered slot; the slot itself is passed as the last argument
struct SlotProxy {
    signature: &'static str,
    function: &'static str,
    params: &'static str,
}

const SLOT_PROXIES: [SlotProxy; 3] = [
    SlotProxy {
        signature: "receive(channel,message)",
        function: "_G.BuildReceiver.Received",
        params: "channel, message",
    },
    SlotProxy {
        signature: "mouseDown(x,y)",
        function: "_G.BuildScreen.MouseDown",
        params: "x, y",
    },
    SlotProxy {
        signature: "mouseUp(x,y)",
        function: "_G.BuildScreen.MouseUp",
        params: "x, y",
    },
];

const TIMER_SIGNATURE: &str = "tick(timerId)";

/// Number of proxy handlers appended for a main file declaring `timers` timers
pub const fn proxy_count(timers: usize) -> usize {
    LIFECYCLE_PROXIES.len() + timers + Slot::ALL.len() * SLOT_PROXIES.len()
}

/// Append the proxy tail for `main` to `module`
pub fn append_proxies(module: &mut OutputModule, main: &SourceFile, environment: &Environment) {
    let first = module.len();

    for proxy in &LIFECYCLE_PROXIES {
        module.push_handler(
            proxy.slot_key,
            proxy.signature,
            vec![ArgMatcher::Wildcard; proxy.wildcards],
            environment.substitute(proxy.code),
        );
    }

    for timer in main.timers() {
        module.push_handler(
            SlotKey::Unit,
            TIMER_SIGNATURE,
            vec![ArgMatcher::Literal(timer.clone())],
            environment.substitute(&format!("_G.BuildUnit.Tick(\"{timer}\")")),
        );
    }

    for slot in Slot::ALL {
        for proxy in &SLOT_PROXIES {
            module.push_handler(
                SlotKey::Slot(slot),
                proxy.signature,
                vec![ArgMatcher::Wildcard; 2],
                environment.substitute(&format!(
                    "{}({}, {})",
                    proxy.function,
                    proxy.params,
                    slot.name()
                )),
            );
        }
    }

    debug!(
        "Appended {} proxy handlers for {}",
        module.len() - first,
        main.name()
    );
}
