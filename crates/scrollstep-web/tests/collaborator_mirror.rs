//! The web host's command queue mirrors direct collaborator calls.
//!
//! The same input stream is fed to a [`WebStepHost`] and to a controller
//! wired to recording collaborators; the queued [`HostCommand`]s must match
//! the recorded calls one for one.

use proptest::prelude::*;
use scrollstep_core::host::testing::{
    CallLog, HostCall, RecordingDriver, RecordingObserver, RecordingScroller,
};
use scrollstep_core::{RegionSide, ScrollStepConfig, ScrollStepController, WheelDelta};
use scrollstep_web::{HostCommand, StepInput, WebStepHost};

type Recorded = ScrollStepController<RecordingDriver, RecordingScroller, RecordingObserver>;

fn as_call(command: HostCommand) -> HostCall {
    match command {
        HostCommand::StopSmoothScroll => HostCall::Stop,
        HostCommand::StartSmoothScroll => HostCall::Start,
        HostCommand::ScrollToRegion { offset_px } => HostCall::ScrollToRegion(offset_px),
        HostCommand::Observe { threshold } => HostCall::Observe(threshold),
        HostCommand::Disconnect => HostCall::Disconnect,
    }
}

fn feed(controller: &mut Recorded, log: &CallLog, input: StepInput) {
    match input {
        StepInput::Wheel(delta) => {
            controller.dispatch_wheel(delta);
        }
        StepInput::Intersection(ratio) => {
            controller.handle_intersection(ratio);
        }
        StepInput::IntersectionAt { ratio, side } => {
            controller.handle_intersection_at(ratio, Some(side));
        }
        StepInput::Visibility(in_view) => {
            controller.handle_visibility(in_view);
        }
        StepInput::Attach => {
            controller.attach(log.observer());
        }
        StepInput::Detach => {
            controller.detach();
        }
    }
}

fn input_strategy() -> impl Strategy<Value = StepInput> {
    prop_oneof![
        8 => (-200.0f64..200.0).prop_map(|dy| StepInput::Wheel(WheelDelta::pixels(dy))),
        2 => (0.0f64..=1.0).prop_map(StepInput::Intersection),
        2 => (0.0f64..=1.0, any::<bool>()).prop_map(|(ratio, above)| StepInput::IntersectionAt {
            ratio,
            side: if above { RegionSide::Above } else { RegionSide::Below },
        }),
        2 => any::<bool>().prop_map(StepInput::Visibility),
        1 => Just(StepInput::Attach),
        1 => Just(StepInput::Detach),
    ]
}

proptest! {
    #[test]
    fn queued_commands_match_collaborator_calls(
        max_step in 1u16..6,
        inputs in prop::collection::vec(input_strategy(), 1..100),
    ) {
        let config = ScrollStepConfig::with_max_step(max_step);
        let log = CallLog::new();
        let mut recorded =
            Recorded::new(config.clone(), Some(log.driver()), log.scroller()).unwrap();
        let mut host = WebStepHost::new(config, true).unwrap();

        for input in std::iter::once(StepInput::Attach).chain(inputs) {
            feed(&mut recorded, &log, input);
            host.push_input(input);
        }
        recorded.detach();
        host.detach();

        let queued: Vec<HostCall> = host.drain_commands().into_iter().map(as_call).collect();
        prop_assert_eq!(queued, log.calls());
        prop_assert_eq!(host.snapshot(), recorded.snapshot());
    }
}

#[test]
fn late_driver_replacement_matches() {
    let log = CallLog::new();
    let mut recorded =
        Recorded::new(ScrollStepConfig::default(), Some(log.driver()), log.scroller()).unwrap();
    let mut host = WebStepHost::new(ScrollStepConfig::default(), true).unwrap();
    recorded.attach(log.observer());
    host.attach();
    recorded.handle_visibility(true);
    host.push_input(StepInput::Visibility(true));

    recorded.install_driver(log.driver());
    host.install_driver();

    let queued: Vec<HostCall> = host.drain_commands().into_iter().map(as_call).collect();
    pretty_assertions::assert_eq!(queued, log.calls());
    pretty_assertions::assert_eq!(
        log.calls()[3..].to_vec(),
        vec![HostCall::Start, HostCall::Stop]
    );
}
