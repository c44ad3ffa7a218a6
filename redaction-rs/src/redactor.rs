use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::patterns;

/// PII categories, declared in resolution priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PiiCategory {
    Email,
    Protocol,
    Chassis,
    Cpf,
    Plate,
    Phone,
    Name,
}

impl PiiCategory {
    /// Fixed resolution order; earlier categories claim spans first
    pub const ORDER: [PiiCategory; 7] = [
        PiiCategory::Email,
        PiiCategory::Protocol,
        PiiCategory::Chassis,
        PiiCategory::Cpf,
        PiiCategory::Plate,
        PiiCategory::Phone,
        PiiCategory::Name,
    ];

    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiCategory::Email => "[EMAIL]",
            PiiCategory::Protocol => "[PROTOCOLO]",
            PiiCategory::Chassis => "[CHASSI]",
            PiiCategory::Cpf => "[CPF]",
            PiiCategory::Plate => "[PLACA]",
            PiiCategory::Phone => "[TELEFONE]",
            PiiCategory::Name => "[NOME]",
        }
    }

    fn patterns(&self) -> &'static [Regex] {
        match self {
            PiiCategory::Email => &patterns::EMAIL,
            PiiCategory::Protocol => &patterns::PROTOCOL,
            PiiCategory::Chassis => &patterns::CHASSIS,
            PiiCategory::Cpf => &patterns::CPF,
            PiiCategory::Plate => &patterns::PLATE,
            PiiCategory::Phone => &patterns::PHONE,
            PiiCategory::Name => &patterns::NAME,
        }
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder())
    }
}

/// Outcome of a redaction, with per-category replacement counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    pub text: String,
    pub was_modified: bool,
    pub counts: BTreeMap<PiiCategory, usize>,
}

impl Redaction {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    category: PiiCategory,
}

impl Span {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end && self.start < end
    }
}

/// Redact all recognised PII in `text`
pub fn redact(text: &str) -> String {
    redact_with_report(text).text
}

/// Redact all recognised PII in `text` and report what was replaced
pub fn redact_with_report(text: &str) -> Redaction {
    let mut current = text.to_string();
    let mut counts: BTreeMap<PiiCategory, usize> = BTreeMap::new();

    // Each productive pass turns at least one character of source text into
    // placeholder text, which no pattern matches, so this reaches a fixed point.
    loop {
        let spans = claim_spans(&current);
        if spans.is_empty() {
            break;
        }
        for span in &spans {
            *counts.entry(span.category).or_insert(0) += 1;
        }
        current = splice(&current, &spans);
    }

    if !counts.is_empty() {
        log::trace!("redacted {} span(s)", counts.values().sum::<usize>());
    }

    Redaction {
        was_modified: current != text,
        text: current,
        counts,
    }
}

/// Resolve non-overlapping spans: category order first, then longest, then leftmost
fn claim_spans(text: &str) -> Vec<Span> {
    let mut claimed: Vec<Span> = Vec::new();

    for category in PiiCategory::ORDER {
        let mut candidates: Vec<(usize, usize)> = Vec::new();
        for pattern in category.patterns() {
            for caps in pattern.captures_iter(text) {
                if let Some(m) = caps.name("pii").or_else(|| caps.get(0)) {
                    if !m.as_str().is_empty() {
                        candidates.push((m.start(), m.end()));
                    }
                }
            }
        }

        candidates.sort_by(|a, b| (b.1 - b.0).cmp(&(a.1 - a.0)).then(a.0.cmp(&b.0)));
        candidates.dedup();

        for (start, end) in candidates {
            if claimed.iter().all(|span| !span.overlaps(start, end)) {
                claimed.push(Span { start, end, category });
            }
        }
    }

    claimed.sort_by_key(|span| span.start);
    claimed
}

fn splice(text: &str, spans: &[Span]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        output.push_str(&text[cursor..span.start]);
        output.push_str(span.category.placeholder());
        cursor = span.end;
    }
    output.push_str(&text[cursor..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use test_case::test_case;

    #[test_case("Fale com João da Silva amanhã", "Fale com [NOME] amanhã" ; "name with particle")]
    #[test_case("Meu CPF é 123.456.789-00.", "Meu CPF é [CPF]." ; "formatted cpf")]
    #[test_case("cpf: 12345678900", "cpf: [CPF]" ; "keyword cpf")]
    #[test_case("ligar em (11) 98765-4321 hoje", "ligar em [TELEFONE] hoje" ; "phone with ddd")]
    #[test_case("ligar +55 11 98765-4321", "ligar [TELEFONE]" ; "international phone")]
    #[test_case("ramal 3456-7890", "ramal [TELEFONE]" ; "local phone")]
    #[test_case("escreva para maria.souza@example.com.br!", "escreva para [EMAIL]!" ; "email")]
    #[test_case("placa ABC-1234 e BRA2E19", "placa [PLACA] e [PLACA]" ; "plates")]
    #[test_case("chassi: 9BWZZZ377VT004251", "chassi: [CHASSI]" ; "keyword chassis")]
    #[test_case("VIN 9BWZZZ377VT004251 informado", "VIN [CHASSI] informado" ; "bare vin")]
    #[test_case("Protocolo nº 2024/556677 aberto", "Protocolo nº [PROTOCOLO] aberto" ; "protocol")]
    #[test_case("Meu nome é Roberta Alves e comprei", "Meu nome é [NOME] e comprei" ; "introduced name")]
    #[test_case("a atendente Kelly não respondeu", "a atendente [NOME] não respondeu" ; "single name after role")]
    #[test_case("Sr. Osvaldo Prado ligou", "Sr. [NOME] ligou" ; "honorific")]
    fn replaces_with_placeholder(input: &str, expected: &str) {
        assert_eq!(redact(input), expected);
    }

    #[test_case("Comprei na Mercedes Benz de São Paulo" ; "brand and city")]
    #[test_case("Chassi Errado informado. Carro Novo parado" ; "sentence start pairs")]
    #[test_case("Fui à Concessionária Autorizada ontem" ; "capitalised common nouns")]
    #[test_case("Classe A com Central Multimídia travada" ; "model and feature names")]
    #[test_case("Maria ligou ontem" ; "given name without surname")]
    fn capitalised_words_that_are_not_people_survive(input: &str) {
        assert_eq!(redact(input), input);
    }

    #[test]
    fn cpf_scenario_leaves_no_digits() {
        let output = redact("João da Silva, CPF 123.456.789-00");
        assert!(output.contains("[NOME]"));
        assert!(output.contains("[CPF]"));

        let cpf_like = Regex::new(r"\d{3}\.?\d{3}\.?\d{3}-?\d{2}").unwrap();
        assert!(!cpf_like.is_match(&output));
        assert_eq!(output, "[NOME], CPF [CPF]");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let input = "  o carro  quebrou\tna estrada, sem peças.\n";
        let report = redact_with_report(input);
        assert_eq!(report.text, input);
        assert!(!report.was_modified);
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn empty_input_is_fine() {
        assert_eq!(redact(""), "");
    }

    #[test]
    fn earlier_category_claims_the_span() {
        // The protocol number also looks like a bare phone number
        assert_eq!(redact("protocolo 11987654321"), "protocolo [PROTOCOLO]");
    }

    #[test]
    fn longest_candidate_wins_within_category() {
        assert_eq!(redact("tel +55 (11) 98765-4321"), "tel [TELEFONE]");
    }

    #[test]
    fn report_counts_each_category() {
        let report = redact_with_report("Ana Paula Lima ligou de 3456-7890 e 3456-7891");
        assert!(report.was_modified);
        assert_eq!(report.counts.get(&PiiCategory::Name), Some(&1));
        assert_eq!(report.counts.get(&PiiCategory::Phone), Some(&2));
    }

    #[test_case("João da Silva, CPF 123.456.789-00" ; "scenario")]
    #[test_case("contato: ana@x.com1234-5678" ; "email glued to phone")]
    #[test_case("Protocolo 123 456 do chassi 9BWZZZ377VT004251" ; "protocol and chassis")]
    #[test_case("[NOME] [CPF] [TELEFONE] [EMAIL] [PLACA] [CHASSI] [PROTOCOLO]" ; "only placeholders")]
    #[test_case("Carlos Eduardo dos Santos, placa ABC 1234, fone 11 3456-7890" ; "mixed")]
    #[test_case("cpf 123456789-00 / 98765432100" ; "cpf variants")]
    #[test_case("protocolo protocolo 99 chassi chassi 123456" ; "repeated keywords")]
    fn redaction_is_idempotent(input: &str) {
        let once = redact(input);
        let twice = redact(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn placeholders_survive_untouched() {
        let text = "[NOME] [CPF] [TELEFONE] [EMAIL] [PLACA] [CHASSI] [PROTOCOLO]";
        assert_eq!(redact(text), text);
    }
}
