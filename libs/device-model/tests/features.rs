mod test_support;

use devbind_model::{
    load_descriptor, DescriptorError, DescriptorFormat, Feature, Name, PacketKind,
};
use test_support::MINIMAL;

fn with_features(features: &str) -> Result<devbind_model::Device, DescriptorError> {
    let text = MINIMAL.replace(
        r#""released": true,"#,
        &format!(r#""released": true, "features": {},"#, features),
    );
    load_descriptor(&text, DescriptorFormat::Json)
}

#[test]
fn comcu_bricklets_gain_the_shared_surface() {
    let device = with_features(r#"["comcu_bricklet", "bricklet_get_identity"]"#).unwrap();
    assert!(device.has_feature(Feature::ComcuBricklet));

    for group in ["Bootloader Mode", "Bootloader Status", "Status LED Config"] {
        assert!(device.constant_group(&Name::new(group)).is_some(), "{}", group);
    }

    let identity = device.packet(&Name::new("Get Identity")).unwrap();
    assert_eq!(identity.function_id, 255);
    assert_eq!(identity.kind, PacketKind::Function);

    let spitfp = device.packet(&Name::new("Get SPITFP Error Count")).unwrap();
    assert_eq!(spitfp.function_id, 234);
    assert_eq!(spitfp.output_count(), 4);

    // Descriptor packets keep their positions ahead of the shared ones.
    assert_eq!(device.packets[0].name, Name::new("Get Value"));
    assert!(device.packets[2..].iter().all(|p| p.function_id >= 233));
}

#[test]
fn unknown_features_fail_loading() {
    let err = with_features(r#"["comcu_bricklet", "warp_drive"]"#).unwrap_err();
    assert!(matches!(err, DescriptorError::UnknownFeature(f) if f == "warp_drive"));
}

#[test]
fn features_must_match_the_category() {
    let err = with_features(r#"["brick_status_led"]"#).unwrap_err();
    assert!(matches!(
        err,
        DescriptorError::FeatureCategoryMismatch { feature, .. } if feature == "brick_status_led"
    ));
}

#[test]
fn shared_groups_cannot_be_redeclared() {
    let text = MINIMAL
        .replace(
            r#""released": true,"#,
            r#""released": true, "features": ["comcu_bricklet"],"#,
        )
        .replace(
            r#""packets": ["#,
            r#""constant_groups": [{"name": "Bootloader Mode", "type": "uint8", "constants": [["Off", 0]]}],
            "packets": ["#,
        );
    assert!(matches!(
        load_descriptor(&text, DescriptorFormat::Json),
        Err(DescriptorError::Duplicate { kind: "constant group", .. })
    ));
}

#[test]
fn feature_names_round_trip_through_display() {
    for feature in Feature::ALL {
        assert_eq!(feature.to_string().parse::<Feature>().unwrap(), feature);
    }
}
