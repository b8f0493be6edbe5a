//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Single pass over the template: substituted values are never rescanned, so
/// user text containing `{resposta}` reaches the prompt unchanged. Braces that
/// do not name a known key are kept literally.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let hit = after.find('}').and_then(|close| {
      let key = &after[..close];
      pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (close, *v))
    });
    match hit {
      Some((close, value)) => {
        out.push_str(value);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let cut = floor_char_boundary(s, max);
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Largest index `<= max` that sits on a UTF-8 char boundary.
pub fn floor_char_boundary(s: &str, max: usize) -> usize {
  if max >= s.len() {
    return s.len();
  }
  let mut i = max;
  while !s.is_char_boundary(i) {
    i -= 1;
  }
  i
}

/// Lowercase and drop the Portuguese diacritics we care about, so label and
/// token matching does not depend on how the model spelled "Explicação".
pub fn fold(s: &str) -> String {
  s.chars()
    .flat_map(char::to_lowercase)
    .map(|c| match c {
      'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
      'é' | 'è' | 'ê' | 'ë' => 'e',
      'í' | 'ì' | 'î' | 'ï' => 'i',
      'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
      'ú' | 'ù' | 'û' | 'ü' => 'u',
      'ç' => 'c',
      other => other,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{a} e {b}, {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x e y, x");
  }

  #[test]
  fn fill_template_does_not_rescan_values() {
    let out = fill_template("Q: {questao}\nR: {resposta}", &[("questao", "print(f'{resposta}')"), ("resposta", "A) x")]);
    assert_eq!(out, "Q: print(f'{resposta}')\nR: A) x");
  }

  #[test]
  fn fill_template_keeps_unknown_braces() {
    let out = fill_template("{\"titulo\": string} {nivel} {", &[("nivel", "fácil")]);
    assert_eq!(out, "{\"titulo\": string} fácil {");
  }

  #[test]
  fn trunc_for_log_respects_char_boundaries() {
    let s = "ação".repeat(10);
    let t = trunc_for_log(&s, 3);
    assert!(t.starts_with("a"));
    assert!(t.contains("bytes total"));
  }

  #[test]
  fn fold_strips_accents_and_case() {
    assert_eq!(fold("Explicação"), "explicacao");
    assert_eq!(fold("AVANÇADO"), "avancado");
    assert_eq!(fold("Intermediário"), "intermediario");
  }
}
