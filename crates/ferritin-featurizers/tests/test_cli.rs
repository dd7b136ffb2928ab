use assert_cmd::Command;
use candle_core::{safetensors, Device};
use ferritin_test_data::{precomputed_alignments, TestFile};
use tempfile::tempdir;

#[test]
fn test_cli_featurize_single_sequence() {
    let (fasta, _tmp) = TestFile::monomer().create_temp().unwrap();
    let out = tempdir().unwrap();
    let output = out.path().join("features.safetensors");

    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("featurize")
        .arg("--input")
        .arg(&fasta)
        .arg("--output")
        .arg(&output);
    cmd.assert().success();

    let tensors = safetensors::load(&output, &Device::Cpu).unwrap();
    assert_eq!(tensors["msa"].dims(), &[1, 10]);
    assert_eq!(tensors["aatype"].dims(), &[10, 21]);
    assert_eq!(tensors["template_all_atom_positions"].dims(), &[1, 10, 37, 3]);
    assert!(!tensors.contains_key("sequence"));
}

#[test]
fn test_cli_featurize_multimer_with_templates() {
    let (fasta, _tmp) = TestFile::heterodimer().create_temp().unwrap();
    let msas = precomputed_alignments().unwrap();
    let out = tempdir().unwrap();
    let output = out.path().join("features.safetensors");
    let domain_names = out.path().join("domain_names.json");
    let a3m = out.path().join("combined.a3m");

    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("featurize")
        .arg("--input")
        .arg(&fasta)
        .arg("--msa-dir")
        .arg(msas.path())
        .arg("--model-type")
        .arg("alphafold2_multimer_v3")
        .arg("--templates")
        .arg("--output")
        .arg(&output)
        .arg("--domain-names")
        .arg(&domain_names)
        .arg("--a3m")
        .arg(&a3m);
    cmd.assert().success();

    let tensors = safetensors::load(&output, &Device::Cpu).unwrap();
    assert_eq!(tensors["aatype"].dims(), &[17]);
    assert_eq!(tensors["msa"].dims(), &[512, 17]);
    assert_eq!(tensors["template_aatype"].dims(), &[4, 17]);

    let names: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&domain_names).unwrap()).unwrap();
    assert_eq!(names["A"], serde_json::json!(["1abc_A"]));
    assert_eq!(names["B"], serde_json::json!([]));

    let combined = std::fs::read_to_string(&a3m).unwrap();
    assert!(combined.starts_with("#10,7\t1,1\n"));
}

#[test]
fn test_cli_featurize_padded() {
    let (fasta, _tmp) = TestFile::homodimer().create_temp().unwrap();
    let out = tempdir().unwrap();
    let output = out.path().join("features.safetensors");

    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("featurize")
        .arg("--input")
        .arg(&fasta)
        .arg("--msa-mode")
        .arg("single_sequence")
        .arg("--pad-len")
        .arg("32")
        .arg("--output")
        .arg(&output);
    cmd.assert().success();

    let tensors = safetensors::load(&output, &Device::Cpu).unwrap();
    assert_eq!(tensors["aatype"].dims(), &[32, 21]);
    assert_eq!(tensors["asym_id"].dims(), &[32]);
    assert_eq!(tensors["template_all_atom_positions"].dims(), &[4, 32, 37, 3]);
}

#[test]
fn test_cli_rejects_unknown_mode() {
    let (fasta, _tmp) = TestFile::monomer().create_temp().unwrap();
    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("featurize")
        .arg("--input")
        .arg(&fasta)
        .arg("--pair-mode")
        .arg("sometimes")
        .arg("--output")
        .arg("unused.safetensors");
    cmd.assert().failure();
}

#[test]
fn test_cli_coverage() {
    let (a3m, _tmp) = TestFile::msa_01().create_temp().unwrap();
    let out = tempdir().unwrap();
    let output = out.path().join("coverage.svg");

    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("coverage")
        .arg("--a3m")
        .arg(&a3m)
        .arg("--output")
        .arg(&output);
    cmd.assert().success();

    let svg = std::fs::read_to_string(&output).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("Sequence coverage"));
}

fn write_model_output(path: &std::path::Path) {
    let pae = candle_core::Tensor::from_vec(
        vec![0.0f32, 30.0, 30.0, 15.0, 0.0, 30.0, 30.0, 30.0, 0.0],
        (3, 3),
        &Device::Cpu,
    )
    .unwrap();
    let plddt = candle_core::Tensor::from_vec(vec![90.0f32, 75.0, 40.0], 3, &Device::Cpu).unwrap();
    let tensors = std::collections::HashMap::from([
        ("predicted_aligned_error".to_string(), pae),
        ("plddt".to_string(), plddt),
    ]);
    safetensors::save(&tensors, path).unwrap();
}

#[test]
fn test_cli_pae() {
    let out = tempdir().unwrap();
    let model_1 = out.path().join("model_1.safetensors");
    let model_2 = out.path().join("model_2.safetensors");
    write_model_output(&model_1);
    write_model_output(&model_2);
    let output = out.path().join("pae.svg");

    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("pae")
        .arg("--input")
        .arg(&model_1)
        .arg(&model_2)
        .arg("--output")
        .arg(&output);
    cmd.assert().success();

    let svg = std::fs::read_to_string(&output).unwrap();
    assert_eq!(svg.matches("class=\"pae\"").count(), 2);
    assert!(svg.contains("model_1"));
    assert!(svg.contains("model_2"));
}

#[test]
fn test_cli_plddt() {
    let out = tempdir().unwrap();
    let model = out.path().join("model_1.safetensors");
    write_model_output(&model);
    let output = out.path().join("plddt.svg");

    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("plddt")
        .arg("--input")
        .arg(&model)
        .arg("--chain-lengths")
        .arg("2,1")
        .arg("--output")
        .arg(&output);
    cmd.assert().success();

    let svg = std::fs::read_to_string(&output).unwrap();
    assert_eq!(svg.matches("<polyline").count(), 1);
    assert_eq!(svg.matches("chain-boundary").count(), 1);
}

#[test]
fn test_cli_pae_missing_key() {
    let out = tempdir().unwrap();
    let model = out.path().join("model_1.safetensors");
    write_model_output(&model);

    let mut cmd = Command::cargo_bin("ferritin-featurizers").unwrap();
    cmd.arg("pae")
        .arg("--input")
        .arg(&model)
        .arg("--key")
        .arg("pae_logits")
        .arg("--output")
        .arg(out.path().join("pae.svg"));
    cmd.assert().failure();
}
