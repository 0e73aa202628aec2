//! Per-language prompt text, kept as data the composer assembles.
//!
//! Number rendering: identifiers (order numbers) are spelled digit by digit
//! as spaced numerals, which every supported TTS locale reads one digit at a
//! time; amounts and minutes stay cardinal. Item lists are capped so a
//! greeting stays under roughly twenty-five seconds of speech.

use crate::session::state::{Language, OrderItem};

/// Items named before the list is folded into "and N more".
const MAX_SPOKEN_ITEMS: usize = 3;

/// An order number read as "1 2 3 4 5".
pub fn spell_digits(n: u64) -> String {
    let digits: Vec<String> = n.to_string().chars().map(|c| c.to_string()).collect();
    digits.join(" ")
}

/// Cardinal rupee amount; integral values lose the trailing ".0" so the TTS
/// does not read "point zero".
pub fn currency_amount(language: Language, amount: f64) -> String {
    let rendered = if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{amount:.2}")
    };
    match language {
        Language::En => format!("{rendered} rupees"),
        Language::Hi => format!("{rendered} रुपये"),
        Language::Mr => format!("{rendered} रुपये"),
    }
}

pub fn items_summary(language: Language, items: &[OrderItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let spoken: Vec<String> = items
        .iter()
        .take(MAX_SPOKEN_ITEMS)
        .map(|item| match language {
            Language::En => format!("{} {}", item.quantity, item.name),
            Language::Hi | Language::Mr => format!("{} {}", item.quantity, item.name),
        })
        .collect();
    let list = spoken.join(", ");
    let remaining = items.len().saturating_sub(MAX_SPOKEN_ITEMS);
    if remaining == 0 {
        return Some(list);
    }
    Some(match language {
        Language::En => format!("{list} and {remaining} more items"),
        Language::Hi => format!("{list} और {remaining} और चीज़ें"),
        Language::Mr => format!("{list} आणि आणखी {remaining} पदार्थ"),
    })
}

pub fn vendor_greeting(
    language: Language,
    vendor_name: Option<&str>,
    order_id: u64,
    amount: Option<f64>,
    items: Option<&str>,
) -> String {
    let order = spell_digits(order_id);
    let mut text = match language {
        Language::En => {
            let name = vendor_name.unwrap_or("partner");
            format!(
                "Hello {name}, this is a call from Mangwale. You have a new order, number {order}."
            )
        }
        Language::Hi => {
            let name = vendor_name.unwrap_or("पार्टनर");
            format!(
                "नमस्ते {name}, यह मंगवाले की ओर से कॉल है। आपके लिए नया ऑर्डर आया है, नंबर {order}।"
            )
        }
        Language::Mr => {
            let name = vendor_name.unwrap_or("पार्टनर");
            format!(
                "नमस्कार {name}, हा मंगवाले कडून कॉल आहे। तुमच्यासाठी नवीन ऑर्डर आली आहे, नंबर {order}।"
            )
        }
    };
    if let Some(amount) = amount {
        let amount = currency_amount(language, amount);
        text.push(' ');
        text.push_str(&match language {
            Language::En => format!("Order total {amount}."),
            Language::Hi => format!("कुल राशि {amount}।"),
            Language::Mr => format!("एकूण रक्कम {amount}।"),
        });
    }
    if let Some(items) = items {
        text.push(' ');
        text.push_str(&match language {
            Language::En => format!("Items: {items}."),
            Language::Hi => format!("सामान: {items}।"),
            Language::Mr => format!("पदार्थ: {items}।"),
        });
    }
    text.push(' ');
    text.push_str(match language {
        Language::En => "Press 1 to accept the order, press 0 to reject.",
        Language::Hi => "ऑर्डर स्वीकार करने के लिए 1 दबाएं, अस्वीकार करने के लिए 0 दबाएं।",
        Language::Mr => "ऑर्डर स्वीकारण्यासाठी 1 दाबा, नाकारण्यासाठी 0 दाबा।",
    });
    text
}

pub fn rider_greeting(language: Language, rider_name: Option<&str>, order_id: u64) -> String {
    let order = spell_digits(order_id);
    match language {
        Language::En => {
            let name = rider_name.unwrap_or("partner");
            format!(
                "Hello {name}, this is a call from Mangwale. A new delivery, order number {order}, is ready for pickup. Press 1 to accept the delivery, press 0 to decline."
            )
        }
        Language::Hi => {
            let name = rider_name.unwrap_or("पार्टनर");
            format!(
                "नमस्ते {name}, यह मंगवाले की ओर से कॉल है। नई डिलीवरी, ऑर्डर नंबर {order}, आपके लिए तैयार है। डिलीवरी स्वीकार करने के लिए 1 दबाएं, मना करने के लिए 0 दबाएं।"
            )
        }
        Language::Mr => {
            let name = rider_name.unwrap_or("पार्टनर");
            format!(
                "नमस्कार {name}, हा मंगवाले कडून कॉल आहे। नवीन डिलिव्हरी, ऑर्डर नंबर {order}, तुमच्यासाठी तयार आहे। डिलिव्हरी स्वीकारण्यासाठी 1 दाबा, नाकारण्यासाठी 0 दाबा।"
            )
        }
    }
}

pub fn prep_time_menu(language: Language) -> String {
    match language {
        Language::En => {
            "How many minutes to prepare the order? Press 1 for 15 minutes, press 2 for 30 minutes, press 3 for 45 minutes.".to_string()
        }
        Language::Hi => {
            "ऑर्डर तैयार करने में कितने मिनट लगेंगे? 15 मिनट के लिए 1 दबाएं, 30 मिनट के लिए 2 दबाएं, 45 मिनट के लिए 3 दबाएं।".to_string()
        }
        Language::Mr => {
            "ऑर्डर तयार करायला किती मिनिटे लागतील? 15 मिनिटांसाठी 1 दाबा, 30 मिनिटांसाठी 2 दाबा, 45 मिनिटांसाठी 3 दाबा।".to_string()
        }
    }
}

pub fn rejection_menu(language: Language) -> String {
    match language {
        Language::En => {
            "Why are you rejecting the order? Press 1 if items are unavailable, press 2 if you are too busy, press 3 if you are closing, press 4 for any other reason.".to_string()
        }
        Language::Hi => {
            "आप ऑर्डर क्यों अस्वीकार कर रहे हैं? सामान उपलब्ध नहीं है तो 1 दबाएं, बहुत व्यस्त हैं तो 2 दबाएं, दुकान बंद हो रही है तो 3 दबाएं, किसी और कारण के लिए 4 दबाएं।".to_string()
        }
        Language::Mr => {
            "तुम्ही ऑर्डर का नाकारत आहात? पदार्थ उपलब्ध नसतील तर 1 दाबा, खूप व्यस्त असाल तर 2 दाबा, दुकान बंद होत असेल तर 3 दाबा, इतर कारणासाठी 4 दाबा।".to_string()
        }
    }
}

pub fn goodbye_accepted(language: Language, prep_minutes: u32) -> String {
    match language {
        Language::En => format!(
            "Thank you. A rider will reach you in about {prep_minutes} minutes. Goodbye."
        ),
        Language::Hi => format!(
            "धन्यवाद। राइडर लगभग {prep_minutes} मिनट में आपके पास पहुंचेगा। नमस्ते।"
        ),
        Language::Mr => format!(
            "धन्यवाद। रायडर सुमारे {prep_minutes} मिनिटांत तुमच्याकडे पोहोचेल। नमस्कार।"
        ),
    }
}

pub fn goodbye_rider_accepted(language: Language) -> String {
    match language {
        Language::En => "Thank you. The pickup details are in your app. Goodbye.".to_string(),
        Language::Hi => "धन्यवाद। पिकअप की जानकारी आपके ऐप में है। नमस्ते।".to_string(),
        Language::Mr => "धन्यवाद। पिकअपची माहिती तुमच्या ॲपमध्ये आहे। नमस्कार।".to_string(),
    }
}

pub fn goodbye_rejected(language: Language) -> String {
    match language {
        Language::En => {
            "Thank you, we will reassign the order. Goodbye.".to_string()
        }
        Language::Hi => "धन्यवाद, हम ऑर्डर किसी और को देंगे। नमस्ते।".to_string(),
        Language::Mr => "धन्यवाद, आम्ही ऑर्डर दुसऱ्याला देऊ। नमस्कार।".to_string(),
    }
}

pub fn goodbye_no_response(language: Language) -> String {
    match language {
        Language::En => "We did not receive an answer. We will call again shortly. Goodbye.".to_string(),
        Language::Hi => "हमें कोई जवाब नहीं मिला। हम थोड़ी देर में फिर कॉल करेंगे। नमस्ते।".to_string(),
        Language::Mr => "आम्हाला उत्तर मिळाले नाही। आम्ही थोड्या वेळाने पुन्हा कॉल करू। नमस्कार।".to_string(),
    }
}

pub fn no_input_retry(language: Language) -> String {
    match language {
        Language::En => "Sorry, I did not catch that. Please try again.".to_string(),
        Language::Hi => "माफ़ कीजिए, समझ नहीं आया। कृपया फिर से दबाएं।".to_string(),
        Language::Mr => "माफ करा, समजले नाही। कृपया पुन्हा दाबा।".to_string(),
    }
}

pub fn apology(language: Language) -> String {
    match language {
        Language::En => "Sorry, something went wrong on our side. We will call you again. Goodbye.".to_string(),
        Language::Hi => "माफ़ कीजिए, हमारी तरफ से कुछ गड़बड़ हो गई। हम आपको फिर कॉल करेंगे। नमस्ते।".to_string(),
        Language::Mr => "माफ करा, आमच्याकडून काही चूक झाली। आम्ही तुम्हाला पुन्हा कॉल करू। नमस्कार।".to_string(),
    }
}

pub fn unknown_call(language: Language) -> String {
    match language {
        Language::En => "Sorry, we could not find the details of this call. Please try again later. Goodbye.".to_string(),
        Language::Hi => "माफ़ कीजिए, इस कॉल की जानकारी नहीं मिली। कृपया थोड़ी देर बाद कोशिश करें। नमस्ते।".to_string(),
        Language::Mr => "माफ करा, या कॉलची माहिती मिळाली नाही। कृपया थोड्या वेळाने पुन्हा प्रयत्न करा। नमस्कार।".to_string(),
    }
}

pub fn retry_shortly(language: Language) -> String {
    match language {
        Language::En => "Please hold on for a moment.".to_string(),
        Language::Hi => "कृपया एक पल रुकिए।".to_string(),
        Language::Mr => "कृपया एक क्षण थांबा।".to_string(),
    }
}
