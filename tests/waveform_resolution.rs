//! Resolver properties through the public API.

use daq_device_classes::waveform::{
    report, resolve, AmplitudeHiLevel, AxisValue, CanonicalParameter, CommandTable,
    OffsetLoLevel, PeriodFrequency, ShapeAxis, SignalModel, SweepSelection, WaveformKind,
};
use daq_device_classes::DeviceError;

const FG: SignalModel = SignalModel::FunctionGenerator;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

fn with_period(period: f64) -> SweepSelection {
    SweepSelection {
        period_frequency: AxisValue::new(PeriodFrequency::Period, period),
        ..Default::default()
    }
}

#[test]
fn period_and_frequency_are_reciprocal() {
    for period in [1e-6, 0.001, 0.1, 0.5, 1.0, 3.0, 250.0] {
        let from_period = resolve(FG, WaveformKind::Sine, &with_period(period)).unwrap();
        assert!(close(from_period.frequency().unwrap(), 1.0 / period));

        let selection = SweepSelection {
            period_frequency: AxisValue::new(PeriodFrequency::Frequency, 1.0 / period),
            ..Default::default()
        };
        let from_frequency = resolve(FG, WaveformKind::Sine, &selection).unwrap();
        assert!(close(from_frequency.period().unwrap(), period));
    }
}

#[test]
fn non_positive_period_is_invalid() {
    for period in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = resolve(FG, WaveformKind::Square, &with_period(period)).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidInput(_)), "period {period}");
    }
}

#[test]
fn sine_from_period_and_high_level() {
    let selection = SweepSelection {
        period_frequency: AxisValue::new(PeriodFrequency::Period, 0.1),
        amplitude_hilevel: AxisValue::new(AmplitudeHiLevel::HiLevel, 0.5),
        offset_lolevel: AxisValue::new(OffsetLoLevel::Offset, 0.0),
        ..Default::default()
    };
    let resolved = resolve(FG, WaveformKind::Sine, &selection).unwrap();
    assert!(close(resolved.frequency().unwrap(), 10.0));
    assert_eq!(resolved.offset(), Some(0.0));
    assert_eq!(resolved.amplitude(), Some(1.0));
}

#[test]
fn high_level_is_offset_plus_half_amplitude() {
    for (offset, high) in [(0.0, 0.5), (-1.0, 2.0), (0.25, 0.3), (3.0, -1.0)] {
        let selection = SweepSelection {
            amplitude_hilevel: AxisValue::new(AmplitudeHiLevel::HiLevel, high),
            offset_lolevel: AxisValue::new(OffsetLoLevel::Offset, offset),
            ..Default::default()
        };
        let resolved = resolve(FG, WaveformKind::Sine, &selection).unwrap();
        let amplitude = resolved.amplitude().unwrap();
        assert!(close(offset + amplitude / 2.0, high));
    }
}

#[test]
fn square_duty_cycle_and_pulse_width_round_trip() {
    let selection = SweepSelection {
        period_frequency: AxisValue::new(PeriodFrequency::Period, 0.1),
        shape: AxisValue::new(ShapeAxis::PulseWidth, 0.02),
        ..Default::default()
    };
    let resolved = resolve(FG, WaveformKind::Square, &selection).unwrap();
    assert!(close(resolved.duty_cycle().unwrap(), 20.0));

    let back = SweepSelection {
        shape: AxisValue::new(ShapeAxis::DutyCycle, resolved.duty_cycle().unwrap()),
        ..selection
    };
    let resolved = resolve(FG, WaveformKind::Square, &back).unwrap();
    assert!(close(resolved.pulse_width().unwrap(), 0.02));
}

#[test]
fn ramp_symmetry_stays_in_percent_range() {
    for rise in [0.0, 0.25, 0.5, 1.0] {
        let selection = SweepSelection {
            rise_time: rise,
            ..with_period(1.0)
        };
        let resolved = resolve(FG, WaveformKind::Ramp, &selection).unwrap();
        let symmetry = resolved.symmetry().unwrap();
        assert!(close(symmetry, rise * 100.0));
        assert!((0.0..=100.0).contains(&symmetry));
    }

    let too_slow = SweepSelection {
        rise_time: 1.5,
        ..with_period(1.0)
    };
    assert!(matches!(
        resolve(FG, WaveformKind::Ramp, &too_slow),
        Err(DeviceError::InvalidInput(_))
    ));
}

#[test]
fn active_parameters_follow_table_order() {
    let table = CommandTable::agilent_33220a();
    let selection = SweepSelection {
        rise_time: 0.1,
        ..with_period(0.5)
    };
    let resolved = resolve(FG, WaveformKind::Pulse, &selection).unwrap();
    let transmitted: Vec<CanonicalParameter> = resolved
        .active(&table)
        .unwrap()
        .into_iter()
        .map(|a| a.parameter)
        .collect();
    let declared: Vec<CanonicalParameter> = table
        .parameters(WaveformKind::Pulse)
        .unwrap()
        .map(|(p, _)| p)
        .filter(|p| resolved.get(*p).is_some())
        .collect();
    assert_eq!(transmitted, declared);
    assert!(!transmitted.contains(&CanonicalParameter::Period));
}

#[test]
fn reverse_resolution_of_sweep_readback() {
    let selection = SweepSelection {
        amplitude_hilevel: AxisValue::new(AmplitudeHiLevel::HiLevel, 2.5),
        offset_lolevel: AxisValue::new(OffsetLoLevel::LoLevel, -0.5),
        ..Default::default()
    };
    assert!(close(report(CanonicalParameter::Period, 4.0, &selection).unwrap(), 0.25));
    assert_eq!(report(CanonicalParameter::HiLevel, 9.9, &selection).unwrap(), 2.5);
    assert_eq!(report(CanonicalParameter::LoLevel, 9.9, &selection).unwrap(), -0.5);
    assert_eq!(report(CanonicalParameter::Amplitude, 1.2, &selection).unwrap(), 1.2);
    assert!(report(CanonicalParameter::Period, 0.0, &selection).is_err());
}
