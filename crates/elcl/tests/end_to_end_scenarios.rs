use std::fs;
use std::path::PathBuf;

use elcl::{
    ErrorCategory, NamePath, ParserSettings, SignatureSigner, SignatureSignerData, SignatureValidator, SignatureValidatorData, Signer, Verdict,
    parse_file, parse_string,
};

fn tempdir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("elcl-scenarios-{:?}-{}", std::thread::current().id(), std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn s1_minimal_integer() {
    let document = parse_string("[main]\nvalue: 42\n", ParserSettings::default()).unwrap();
    assert_eq!(document.integer_at(&NamePath::parse("main.value").unwrap()).unwrap(), 42);
    assert_eq!(document.size(), 1);
}

#[test]
fn s2_float_with_grouping_and_exponent() {
    let document = parse_string("[m]\nv: 8'283.9e-5\n", ParserSettings::default()).unwrap();
    let value = document.float_at(&NamePath::parse("m.v").unwrap()).unwrap();
    assert!((value - 0.082839).abs() < 1e-12);
}

#[test]
fn s3_multi_line_text_with_escapes() {
    let document = parse_string("[x]\nv: \"\"\"\n    Hello\\n\n    World\\u{21}\n    \"\"\"\n", ParserSettings::default()).unwrap();
    assert_eq!(document.text_at(&NamePath::parse("x.v").unwrap()).unwrap(), "Hello\n\nWorld!");
}

#[test]
fn s4_section_list() {
    let document = parse_string("*[server]\nhost: \"a\"\n*[server]\nhost: \"b\"\n", ParserSettings::default()).unwrap();
    let server = document.get_path(&NamePath::parse("server").unwrap()).unwrap();
    assert_eq!(server.size(), 2);
    assert_eq!(document.text_at(&NamePath::parse("server[0].host").unwrap()).unwrap(), "a");
    assert_eq!(document.text_at(&NamePath::parse("server[1].host").unwrap()).unwrap(), "b");
}

#[test]
fn s5_include_loop_is_rejected() {
    let dir = tempdir();
    fs::write(dir.join("main.elcl"), "@include: \"a.elcl\"\n").unwrap();
    fs::write(dir.join("a.elcl"), "@include: \"main.elcl\"\n").unwrap();

    let err = parse_file(dir.join("main.elcl"), ParserSettings::default()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Syntax);
    assert!(err.message().contains("loop"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn s6_signature_round_trip() {
    struct ShiftSigner;
    impl SignatureSigner for ShiftSigner {
        fn sign(&self, data: &SignatureSignerData) -> elcl::Result<String> {
            let shifted: String = data.document_digest.chars().map(|c| ((c as u32) + 1) as u8 as char).collect();
            Ok(format!("{};{shifted}", data.signing_person_text))
        }
    }
    struct ShiftValidator;
    impl SignatureValidator for ShiftValidator {
        fn validate(&self, data: &SignatureValidatorData<'_>) -> Verdict {
            let shifted: String = data.document_digest.chars().map(|c| ((c as u32) + 1) as u8 as char).collect();
            if data.signature_text == format!("someone;{shifted}") { Verdict::Accept } else { Verdict::Reject }
        }
    }

    let dir = tempdir();
    let source = dir.join("main.elcl");
    let signed = dir.join("main.signed.elcl");
    fs::write(&source, "[main]\nvalue: 123\n").unwrap();

    Signer::new(ShiftSigner).sign(&source, &signed, "someone").unwrap();
    let signed_text = fs::read_to_string(&signed).unwrap();
    assert!(signed_text.starts_with("@signature: \""));

    let original = parse_file(&source, ParserSettings::default()).unwrap();
    let resigned = parse_file(&signed, ParserSettings::default().with_validator(ShiftValidator)).unwrap();
    assert_eq!(
        original.integer_at(&NamePath::parse("main.value").unwrap()).unwrap(),
        resigned.integer_at(&NamePath::parse("main.value").unwrap()).unwrap()
    );

    let mut corrupted = fs::read(&signed).unwrap();
    let last = corrupted.len() - 1;
    corrupted[last] = if corrupted[last] == b'3' { b'4' } else { b'3' };
    fs::write(&signed, &corrupted).unwrap();
    let err = parse_file(&signed, ParserSettings::default().with_validator(ShiftValidator)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Signature);

    fs::remove_dir_all(&dir).ok();
}
